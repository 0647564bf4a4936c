// File: main.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use colored::*;
use simple_logger::SimpleLogger;
use std::process::ExitCode;

use wafprobe::cli::Cli;
use wafprobe::config::ScanConfig;
use wafprobe::scan;

fn fail(message: impl std::fmt::Display) -> ExitCode {
    eprintln!("{} {}", "✗".red().bold(), message);
    ExitCode::from(1)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if cli.no_color {
        colored::control::set_override(false);
    }
    if let Err(e) = SimpleLogger::new().with_level(cli.level_filter()).init() {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let config = match ScanConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => return fail(e),
    };

    let report = match scan::run(&config, true).await {
        Ok(report) => report,
        Err(e) => return fail(e),
    };

    print!("{}", report.render_text());

    if let Some(path) = config.report_path() {
        if let Err(e) = report.write_json(path) {
            return fail(format!("{:#}", e));
        }
        println!("{} report written to {}", "✓".green().bold(), path.display());
    }

    ExitCode::SUCCESS
}
