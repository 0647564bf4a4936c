// File: pool.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use log::{debug, error, warn};
use std::fmt::Write;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::aggregate::{Aggregator, ScanSummary};
use crate::corpus::TestCase;
use crate::replay::ExecutionResult;

pub fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    match ProgressStyle::with_template(
        "sending [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {per_sec} ({eta})",
    ) {
        Ok(style) => pb.set_style(
            style
                .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                })
                .progress_chars("█▉▊▋▌▍▎▏  "),
        ),
        Err(e) => debug!("Falling back to default progress style: {}", e),
    }
    pb
}

/// Fixed number of workers draining a pre-filled, closed queue of templates.
pub struct WorkerPool {
    workers: usize,
    progress: ProgressBar,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Replays every case once and returns the totals after all workers have exited.
    pub async fn run<F, Fut>(&self, corpus: Vec<TestCase>, replay: F) -> ScanSummary
    where
        F: Fn(TestCase) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ExecutionResult> + Send + 'static,
    {
        let aggregator = Arc::new(Aggregator::new(corpus.len()));

        let (tx, rx) = mpsc::channel(corpus.len().max(1));
        for case in corpus {
            if tx.send(case).await.is_err() {
                break;
            }
        }
        drop(tx);

        let queue = Arc::new(Mutex::new(rx));
        let replay = Arc::new(replay);

        let mut workers: FuturesUnordered<_> = (0..self.workers)
            .map(|id| {
                let queue = Arc::clone(&queue);
                let replay = Arc::clone(&replay);
                let aggregator = Arc::clone(&aggregator);
                let progress = self.progress.clone();
                tokio::spawn(async move {
                    let mut handled = 0usize;
                    loop {
                        let next = {
                            let mut rx = queue.lock().await;
                            rx.recv().await
                        };
                        let Some(case) = next else {
                            break;
                        };

                        let result = replay(case).await;
                        if let Err(e) = &result.outcome {
                            warn!("{}", e);
                        }
                        aggregator.record(&result);
                        progress.inc(1);
                        handled += 1;
                    }
                    debug!("Worker {} exiting after {} templates", id, handled);
                })
            })
            .collect();

        while let Some(joined) = workers.next().await {
            if let Err(e) = joined {
                error!("Worker task aborted: {}", e);
            }
        }
        self.progress.finish();

        let summary = aggregator.summary();
        if summary.unaccounted() > 0 {
            warn!(
                "{} of {} templates were not accounted for (success {}, error {})",
                summary.unaccounted(),
                summary.total,
                summary.successful,
                summary.failed
            );
        }
        summary
    }
}
