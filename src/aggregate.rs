// File: aggregate.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::corpus::Label;
use crate::replay::ExecutionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    TruePositive,
    TrueNegative,
    FalsePositive,
    FalseNegative,
}

impl Bucket {
    pub fn classify(label: Label, passed: bool) -> Self {
        match (label, passed) {
            (Label::White, true) => Bucket::TrueNegative,
            (Label::White, false) => Bucket::FalsePositive,
            (Label::Black, true) => Bucket::FalseNegative,
            (Label::Black, false) => Bucket::TruePositive,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
}

fn percent(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 * 100.0 / denominator as f64)
    }
}

impl ConfusionMatrix {
    pub fn record(&mut self, bucket: Bucket) {
        match bucket {
            Bucket::TruePositive => self.true_positive += 1,
            Bucket::TrueNegative => self.true_negative += 1,
            Bucket::FalsePositive => self.false_positive += 1,
            Bucket::FalseNegative => self.false_negative += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.true_negative + self.false_positive + self.false_negative
    }

    pub fn black_total(&self) -> usize {
        self.true_positive + self.false_negative
    }

    pub fn white_total(&self) -> usize {
        self.true_negative + self.false_positive
    }

    /// TP / (TP + FN) in percent, `None` without black cases.
    pub fn detection_rate(&self) -> Option<f64> {
        percent(self.true_positive, self.black_total())
    }

    /// FP / (TN + FP) in percent, `None` without white cases.
    pub fn false_positive_rate(&self) -> Option<f64> {
        percent(self.false_positive, self.white_total())
    }

    pub fn accuracy(&self) -> Option<f64> {
        percent(self.true_positive + self.true_negative, self.total())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub mean_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

impl LatencyStats {
    pub fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted: Vec<u128> = samples.iter().map(Duration::as_nanos).collect();
        sorted.sort_unstable();

        let to_ms = |nanos: u128| nanos as f64 / 1_000_000.0;
        let at = |pct: usize| sorted[((sorted.len() - 1) * pct) / 100];
        let sum: u128 = sorted.iter().sum();

        Self {
            samples: sorted.len(),
            mean_ms: Some(to_ms(sum) / sorted.len() as f64),
            p50_ms: Some(to_ms(at(50))),
            p95_ms: Some(to_ms(at(95))),
            max_ms: sorted.last().copied().map(to_ms),
        }
    }
}

#[derive(Debug, Default)]
struct AggregateState {
    matrix: ConfusionMatrix,
    successful: usize,
    failed: usize,
    latencies: Vec<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub matrix: ConfusionMatrix,
    pub detection_rate: Option<f64>,
    pub false_positive_rate: Option<f64>,
    pub accuracy: Option<f64>,
    pub latency: LatencyStats,
    pub wall_time_ms: u128,
}

impl ScanSummary {
    /// Items that were queued but never recorded, e.g. lost with a panicked worker.
    pub fn unaccounted(&self) -> usize {
        self.total.saturating_sub(self.successful + self.failed)
    }
}

/// Shared result sink. Every update happens under one lock and is O(1).
#[derive(Debug)]
pub struct Aggregator {
    total: usize,
    started: Instant,
    state: Mutex<AggregateState>,
}

impl Aggregator {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            started: Instant::now(),
            state: Mutex::new(AggregateState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AggregateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, result: &ExecutionResult) {
        let mut state = self.lock();
        match &result.outcome {
            Ok(outcome) => {
                state.successful += 1;
                state.latencies.push(outcome.elapsed);
                state
                    .matrix
                    .record(Bucket::classify(result.label(), outcome.passed));
            }
            Err(_) => state.failed += 1,
        }
    }

    pub fn summary(&self) -> ScanSummary {
        let state = self.lock();
        let matrix = state.matrix;
        ScanSummary {
            total: self.total,
            successful: state.successful,
            failed: state.failed,
            matrix,
            detection_rate: matrix.detection_rate(),
            false_positive_rate: matrix.false_positive_rate(),
            accuracy: matrix.accuracy(),
            latency: LatencyStats::from_samples(&state.latencies),
            wall_time_ms: self.started.elapsed().as_millis(),
        }
    }
}
