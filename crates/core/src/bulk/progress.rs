use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    Quote,
    Purchase,
}

impl BatchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Purchase => "purchase",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub phase: BatchPhase,
    pub completed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub percent: f64,
    pub elapsed_secs: f64,
    pub throughput_per_sec: f64,
    pub eta_secs: Option<f64>,
}

/// Receives a report after every completed chunk of a phase.
pub trait ProgressSink: Send + Sync {
    fn report(&self, report: &ProgressReport);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn report(&self, _report: &ProgressReport) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressReport) + Send + Sync,
{
    fn report(&self, report: &ProgressReport) {
        self(report)
    }
}

#[derive(Debug)]
pub struct ProgressTracker {
    phase: BatchPhase,
    total: usize,
    completed: usize,
    succeeded: usize,
    failed: usize,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(phase: BatchPhase, total: usize) -> Self {
        Self { phase, total, completed: 0, succeeded: 0, failed: 0, started: Instant::now() }
    }

    pub fn record(&mut self, success: bool) {
        self.completed += 1;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn snapshot(&self) -> ProgressReport {
        let elapsed_secs = self.started.elapsed().as_secs_f64();
        let throughput_per_sec =
            if elapsed_secs > 0.0 { self.completed as f64 / elapsed_secs } else { 0.0 };
        let remaining = self.total.saturating_sub(self.completed);
        let eta_secs = (self.completed > 0)
            .then(|| elapsed_secs / self.completed as f64 * remaining as f64);
        let percent = if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        };

        ProgressReport {
            phase: self.phase,
            completed: self.completed,
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            percent,
            elapsed_secs,
            throughput_per_sec,
            eta_secs,
        }
    }
}

/// Lines per chunk so a report lands roughly every `step_percent` of the batch.
///
/// Never below the concurrency ceiling, so a chunk can always fill every permit.
pub fn chunk_size(total: usize, concurrency: usize, step_percent: u8) -> usize {
    let step = usize::from(step_percent.clamp(1, 100));
    let by_percent = (total * step + 99) / 100;
    by_percent.max(concurrency).max(1)
}
