// File: cli.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use clap::{ArgAction, Parser};
use log::LevelFilter;
use std::path::PathBuf;

use crate::config::{DEFAULT_CORPUS_DIR, DEFAULT_THREADS, DEFAULT_TIMEOUT_MS};

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[arg(
        short = 't',
        long = "target",
        help = "Target website, example: http://192.168.0.1:8080"
    )]
    pub target: Option<String>,

    #[arg(
        short = 'g',
        long = "glob",
        default_value = DEFAULT_CORPUS_DIR,
        help = "Directory holding the request templates"
    )]
    pub glob: PathBuf,

    #[arg(
        long = "timeout",
        default_value_t = DEFAULT_TIMEOUT_MS,
        help = "Connection timeout in milliseconds"
    )]
    pub timeout: u64,

    #[arg(
        long = "thread",
        default_value_t = DEFAULT_THREADS,
        help = "Number of concurrent workers"
    )]
    pub thread: usize,

    #[arg(short = 'H', long = "host", help = "Override the Host header")]
    pub host: Option<String>,

    #[arg(
        long = "rps",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Send one request per connection"
    )]
    pub rps: bool,

    #[arg(short = 'o', long = "output", help = "Write the summary as JSON to this file")]
    pub output: Option<PathBuf>,

    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,

    #[arg(long = "no-color", help = "Disable colored output")]
    pub no_color: bool,
}

/// Long options that are also accepted with a single dash, e.g. `-timeout 500`.
const SINGLE_DASH_LONG: &[&str] = &["timeout", "thread", "rps"];

/// Rewrites `-timeout`, `-thread` and `-rps` (with or without `=value`) to their `--` form.
/// Without this clap reads `-timeout` as `-t imeout`.
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .map(|arg| {
            let Some(rest) = arg.strip_prefix('-').filter(|r| !r.starts_with('-')) else {
                return arg;
            };
            let name = rest.split_once('=').map_or(rest, |(name, _)| name);
            if SINGLE_DASH_LONG.contains(&name) {
                format!("-{}", arg)
            } else {
                arg
            }
        })
        .collect()
}

impl Cli {
    /// Parses the process arguments, accepting single-dash long options.
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_args(std::env::args()))
    }

    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Warn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["wafprobe", "-t", "http://127.0.0.1:8080"]);
        assert_eq!(cli.target.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(cli.glob, PathBuf::from("./testcases/"));
        assert_eq!(cli.timeout, 1000);
        assert_eq!(cli.thread, 2);
        assert!(cli.rps);
        assert!(cli.host.is_none());
        assert_eq!(cli.level_filter(), LevelFilter::Warn);
    }

    #[test]
    fn test_explicit_values() {
        let cli = Cli::parse_from([
            "wafprobe",
            "-t",
            "https://example.com",
            "-g",
            "/tmp/cases",
            "--timeout",
            "250",
            "--thread",
            "8",
            "-H",
            "waf.example.com",
            "--rps",
            "false",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.glob, PathBuf::from("/tmp/cases"));
        assert_eq!(cli.timeout, 250);
        assert_eq!(cli.thread, 8);
        assert_eq!(cli.host.as_deref(), Some("waf.example.com"));
        assert!(!cli.rps);
        assert_eq!(cli.level_filter(), LevelFilter::Debug);
    }

    fn parse_normalized(args: &[&str]) -> Cli {
        Cli::parse_from(normalize_args(args.iter().map(|a| a.to_string())))
    }

    #[test]
    fn test_single_dash_long_options() {
        let cli = parse_normalized(&[
            "wafprobe",
            "-t",
            "http://x",
            "-timeout",
            "500",
            "-thread",
            "4",
            "-rps=false",
        ]);
        assert_eq!(cli.target.as_deref(), Some("http://x"));
        assert_eq!(cli.timeout, 500);
        assert_eq!(cli.thread, 4);
        assert!(!cli.rps);

        let cli = parse_normalized(&["wafprobe", "-timeout=250", "-rps", "false", "-g", "cases"]);
        assert_eq!(cli.timeout, 250);
        assert!(!cli.rps);
        assert_eq!(cli.glob, PathBuf::from("cases"));
    }

    #[test]
    fn test_bare_rps_flag_means_true() {
        let cli = parse_normalized(&["wafprobe", "-rps", "-t", "http://x"]);
        assert!(cli.rps);
        assert_eq!(cli.target.as_deref(), Some("http://x"));
    }

    #[test]
    fn test_normalize_leaves_other_tokens() {
        let args = normalize_args(
            ["wafprobe", "-t", "-timeout", "--thread", "-H", "-"]
                .iter()
                .map(|a| a.to_string()),
        );
        assert_eq!(
            args,
            vec!["wafprobe", "-t", "--timeout", "--thread", "-H", "-"]
        );
    }

    #[test]
    fn test_target_is_optional_at_parse_time() {
        let cli = Cli::parse_from(["wafprobe"]);
        assert!(cli.target.is_none());
    }

    #[test]
    fn test_unknown_log_level_falls_back() {
        let cli = Cli::parse_from(["wafprobe", "--log-level", "loud"]);
        assert_eq!(cli.level_filter(), LevelFilter::Warn);
    }
}
