//! Dispatch metrics for the CLI summary

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::AttemptOutcome;

/// Lock-free counters shared between the dispatcher and its owner
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Total attempts sent
    attempts: AtomicU64,
    /// Attempts classified as success
    successes: AtomicU64,
    /// Attempts classified as retryable failure
    retryable_failures: AtomicU64,
    /// Attempts classified as terminal failure
    terminal_failures: AtomicU64,
    /// Duration of the most recent attempt
    last_duration_ms: AtomicU64,
    /// Slowest attempt seen
    max_duration_ms: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one classified attempt
    pub fn record(&self, outcome: &AttemptOutcome, duration_ms: u64) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let bucket = match outcome {
            AttemptOutcome::Success => &self.successes,
            AttemptOutcome::RetryableFailure(_) => &self.retryable_failures,
            AttemptOutcome::TerminalFailure(_) => &self.terminal_failures,
        };
        bucket.fetch_add(1, Ordering::Relaxed);
        self.last_duration_ms.store(duration_ms, Ordering::Relaxed);
        self.max_duration_ms.fetch_max(duration_ms, Ordering::Relaxed);
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempts: self.attempts(),
            successes: self.successes.load(Ordering::Relaxed),
            retryable_failures: self.retryable_failures.load(Ordering::Relaxed),
            terminal_failures: self.terminal_failures.load(Ordering::Relaxed),
            last_duration_ms: self.last_duration_ms.load(Ordering::Relaxed),
            max_duration_ms: self.max_duration_ms.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatch metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub attempts: u64,
    pub successes: u64,
    pub retryable_failures: u64,
    pub terminal_failures: u64,
    pub last_duration_ms: u64,
    pub max_duration_ms: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "attempts={} success={} retryable={} terminal={} last={}ms max={}ms",
            self.attempts,
            self.successes,
            self.retryable_failures,
            self.terminal_failures,
            self.last_duration_ms,
            self.max_duration_ms
        )
    }
}
