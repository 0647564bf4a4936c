// File: error.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use std::fmt;
use std::path::PathBuf;

/// Invalid or missing command line input. Always fatal before any network activity.
#[derive(Debug)]
pub enum ArgumentError {
    MissingTarget,
    InvalidTarget(String),
    UnsupportedScheme(String),
    InvalidValue { name: &'static str, value: String },
    CorpusUnreadable { dir: PathBuf, source: std::io::Error },
    EmptyCorpus(PathBuf),
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTarget => write!(
                f,
                "missing target, usage: wafprobe -t <url>, example: http://192.168.0.1:8080"
            ),
            Self::InvalidTarget(target) => write!(
                f,
                "invalid target url '{}', example: http://example.com:9443",
                target
            ),
            Self::UnsupportedScheme(scheme) => {
                write!(f, "unsupported scheme '{}', expected http or https", scheme)
            }
            Self::InvalidValue { name, value } => {
                write!(f, "invalid value '{}' for {}", value, name)
            }
            Self::CorpusUnreadable { dir, source } => {
                write!(f, "cannot read corpus directory {}: {}", dir.display(), source)
            }
            Self::EmptyCorpus(dir) => {
                write!(f, "cannot find http file in {}", dir.display())
            }
        }
    }
}

impl std::error::Error for ArgumentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CorpusUnreadable { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Baseline probing failed. Fatal, the corpus is never touched.
#[derive(Debug)]
pub enum CalibrationError {
    Client(reqwest::Error),
    Probe { url: String, source: reqwest::Error },
    NoBlockSignal { status: u16 },
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client(e) => write!(f, "failed to build probe client: {}", e),
            Self::Probe { url, source } => write!(f, "probe request to {} failed: {}", url, source),
            Self::NoBlockSignal { status } => write!(
                f,
                "target answered the baseline and the attack probe with the same status {}, no waf detected",
                status
            ),
        }
    }
}

impl std::error::Error for CalibrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Client(e) => Some(e),
            Self::Probe { source, .. } => Some(source),
            Self::NoBlockSignal { .. } => None,
        }
    }
}

/// Failure of a single corpus item. Never aborts the run.
#[derive(Debug)]
pub enum ReplayError {
    /// Retry budget exhausted while connecting.
    Connection { addr: String, attempts: u32, source: std::io::Error },
    /// Template unreadable or unparseable.
    Codec { path: PathBuf, reason: String },
    /// Send or receive failed on an established connection.
    Io { path: PathBuf, stage: IoStage, source: std::io::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoStage {
    Send,
    Receive,
}

impl fmt::Display for IoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => write!(f, "send request"),
            Self::Receive => write!(f, "read response"),
        }
    }
}

impl ReplayError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Codec { .. } => "codec",
            Self::Io { .. } => "io",
        }
    }
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection {
                addr,
                attempts,
                source,
            } => write!(
                f,
                "connect to {} failed after {} attempts: {}",
                addr, attempts, source
            ),
            Self::Codec { path, reason } => {
                write!(f, "read request file: {} error: {}", path.display(), reason)
            }
            Self::Io {
                path,
                stage,
                source,
            } => write!(f, "{} for {}: {}", stage, path.display(), source),
        }
    }
}

impl std::error::Error for ReplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connection { source, .. } => Some(source),
            Self::Codec { .. } => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

/// Anything that stops a run before the worker pool starts.
#[derive(Debug)]
pub enum ScanError {
    Argument(ArgumentError),
    Calibration(CalibrationError),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument(e) => write!(f, "{}", e),
            Self::Calibration(e) => write!(f, "calibration failed: {}", e),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Argument(e) => Some(e),
            Self::Calibration(e) => Some(e),
        }
    }
}

impl From<ArgumentError> for ScanError {
    fn from(error: ArgumentError) -> Self {
        Self::Argument(error)
    }
}

impl From<CalibrationError> for ScanError {
    fn from(error: CalibrationError) -> Self {
        Self::Calibration(error)
    }
}
