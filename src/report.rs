// File: report.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::*;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::aggregate::ScanSummary;
use crate::calibrate::Calibration;
use crate::config::ScanConfig;

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub generated_at: DateTime<Utc>,
    pub tool: String,
    pub target: String,
    pub workers: usize,
    pub timeout_ms: u64,
    pub calibration: Calibration,
    pub summary: ScanSummary,
}

fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(value) => format!("{:.2}%", value),
        None => "n/a".to_string(),
    }
}

fn format_ms(ms: Option<f64>) -> String {
    match ms {
        Some(value) => format!("{:.2} ms", value),
        None => "n/a".to_string(),
    }
}

impl ScanReport {
    pub fn new(config: &ScanConfig, calibration: Calibration, summary: ScanSummary) -> Self {
        Self {
            generated_at: Utc::now(),
            tool: format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            target: config.target_url().to_string(),
            workers: config.threads(),
            timeout_ms: config.timeout_ms(),
            calibration,
            summary,
        }
    }

    pub fn render_text(&self) -> String {
        let s = &self.summary;
        let m = &s.matrix;
        let mut out = String::new();

        out.push_str(&format!(
            "{} {} (baseline {}, block signal {})\n",
            "Target:".bold(),
            self.target,
            self.calibration.normal_status,
            self.calibration.block.status_code.to_string().yellow()
        ));
        out.push_str(&format!(
            "Total samples: {}    Success: {}    Error: {}\n",
            s.total,
            s.successful.to_string().green(),
            if s.failed > 0 {
                s.failed.to_string().red()
            } else {
                s.failed.to_string().normal()
            }
        ));
        out.push_str(&format!(
            "Detection rate: {} (black samples: {}, blocked: {}, missed: {})\n",
            format_rate(s.detection_rate).bold(),
            m.black_total(),
            m.true_positive,
            m.false_negative
        ));
        out.push_str(&format!(
            "False positive rate: {} (white samples: {}, passed: {}, blocked: {})\n",
            format_rate(s.false_positive_rate).bold(),
            m.white_total(),
            m.true_negative,
            m.false_positive
        ));
        out.push_str(&format!(
            "Accuracy: {} (blocked black + passed white) / classified samples\n",
            format_rate(s.accuracy).bold()
        ));
        out.push_str(&format!(
            "Mean latency: {} (p50 {}, p95 {}, max {})\n",
            format_ms(s.latency.mean_ms),
            format_ms(s.latency.p50_ms),
            format_ms(s.latency.p95_ms),
            format_ms(s.latency.max_ms)
        ));
        out
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize report to JSON")
    }

    pub fn write_json(&self, output_path: &Path) -> Result<()> {
        let json = self.to_json()?;
        let mut file = File::create(output_path)
            .with_context(|| format!("Failed to create {}", output_path.display()))?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}
