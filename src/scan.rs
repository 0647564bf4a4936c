// File: scan.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use log::info;
use std::sync::Arc;

use crate::calibrate::Calibrator;
use crate::config::ScanConfig;
use crate::corpus;
use crate::error::ScanError;
use crate::pool::{progress_bar, WorkerPool};
use crate::replay::ReplayContext;
use crate::report::ScanReport;

/// Collects the corpus, calibrates, then replays every template.
///
/// Corpus discovery runs first so a bad directory fails without network traffic.
/// Calibration failures abort before any template is sent.
pub async fn run(config: &ScanConfig, show_progress: bool) -> Result<ScanReport, ScanError> {
    let cases = corpus::collect(config.corpus_dir())?;
    info!(
        "Loaded {} templates from {}",
        cases.len(),
        config.corpus_dir().display()
    );

    let calibration = Calibrator::new(config)?
        .calibrate(config.target_url())
        .await?;
    info!(
        "Block signal is status {} (baseline {})",
        calibration.block.status_code, calibration.normal_status
    );

    let context = Arc::new(ReplayContext::new(config, calibration.block));
    let mut pool = WorkerPool::new(config.threads());
    if show_progress {
        pool = pool.with_progress(progress_bar(cases.len() as u64));
    }

    let summary = pool
        .run(cases, move |case| {
            let context = Arc::clone(&context);
            async move { context.replay(case).await }
        })
        .await;

    Ok(ScanReport::new(config, calibration, summary))
}
