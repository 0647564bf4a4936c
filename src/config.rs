// File: config.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::cli::Cli;
use crate::error::ArgumentError;

pub const DEFAULT_CORPUS_DIR: &str = "./testcases/";
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_THREADS: usize = 2;

/// Where corpus requests are sent, derived once from the target URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    host: String,
    port: Option<u16>,
    use_tls: bool,
}

impl ConnectionTarget {
    pub fn from_url(url: &Url) -> Result<Self, ArgumentError> {
        let use_tls = match url.scheme() {
            "https" => true,
            "http" => false,
            other => return Err(ArgumentError::UnsupportedScheme(other.to_string())),
        };
        let host = match url.host() {
            Some(url::Host::Ipv6(addr)) => format!("[{}]", addr),
            Some(host) => host.to_string(),
            None => return Err(ArgumentError::InvalidTarget(url.to_string())),
        };
        Ok(Self {
            host,
            port: url.port(),
            use_tls,
        })
    }

    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    /// The URL authority as written, with the port only when it was explicit.
    pub fn address(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }
}

/// Run configuration. Built once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    target_url: String,
    target: ConnectionTarget,
    corpus_dir: PathBuf,
    timeout_ms: u64,
    threads: usize,
    host_override: Option<String>,
    force_close: bool,
    report_path: Option<PathBuf>,
}

impl ScanConfig {
    pub fn new(target_url: &str) -> Result<Self, ArgumentError> {
        let parsed = Url::parse(target_url)
            .map_err(|_| ArgumentError::InvalidTarget(target_url.to_string()))?;
        if parsed.scheme().is_empty() || !parsed.has_host() {
            return Err(ArgumentError::InvalidTarget(target_url.to_string()));
        }
        let target = ConnectionTarget::from_url(&parsed)?;

        Ok(Self {
            target_url: target_url.to_string(),
            target,
            corpus_dir: PathBuf::from(DEFAULT_CORPUS_DIR),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            threads: DEFAULT_THREADS,
            host_override: None,
            force_close: true,
            report_path: None,
        })
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, ArgumentError> {
        let target = cli.target.as_deref().ok_or(ArgumentError::MissingTarget)?;
        let config = Self::new(target)?
            .with_corpus_dir(&cli.glob)
            .with_timeout_ms(cli.timeout)?
            .with_threads(cli.thread)?
            .with_host_override(cli.host.clone())
            .with_force_close(cli.rps)
            .with_report_path(cli.output.clone());
        Ok(config)
    }

    pub fn with_corpus_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.corpus_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Result<Self, ArgumentError> {
        if timeout_ms == 0 {
            return Err(ArgumentError::InvalidValue {
                name: "timeout",
                value: timeout_ms.to_string(),
            });
        }
        self.timeout_ms = timeout_ms;
        Ok(self)
    }

    pub fn with_threads(mut self, threads: usize) -> Result<Self, ArgumentError> {
        if threads == 0 {
            return Err(ArgumentError::InvalidValue {
                name: "thread",
                value: threads.to_string(),
            });
        }
        self.threads = threads;
        Ok(self)
    }

    pub fn with_host_override(mut self, host: Option<String>) -> Self {
        self.host_override = host.filter(|h| !h.trim().is_empty());
        self
    }

    pub fn with_force_close(mut self, force_close: bool) -> Self {
        self.force_close = force_close;
        self
    }

    pub fn with_report_path(mut self, path: Option<PathBuf>) -> Self {
        self.report_path = path;
        self
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn corpus_dir(&self) -> &Path {
        &self.corpus_dir
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn host_override(&self) -> Option<&str> {
        self.host_override.as_deref()
    }

    pub fn force_close(&self) -> bool {
        self.force_close
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.report_path.as_deref()
    }
}
