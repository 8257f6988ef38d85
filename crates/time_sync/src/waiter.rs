//! CancellableWaiter - polling wait towards a monotonic deadline

use std::time::Duration;

use contracts::{CancellationFlag, ModeLog};
use tokio::time::Instant;
use tracing::instrument;

/// Result of [`CancellableWaiter::wait_until`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Completed,
    Cancelled,
}

/// Sleeps in short slices so a stop request is seen within one poll interval
#[derive(Debug, Clone)]
pub struct CancellableWaiter {
    poll_interval: Duration,
    countdown_interval: Option<Duration>,
}

impl CancellableWaiter {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            countdown_interval: None,
        }
    }

    /// Emit a "remaining" log line every `interval` (`None` disables it)
    pub fn with_countdown(mut self, interval: Option<Duration>) -> Self {
        self.countdown_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Block until `deadline` or until `cancel` is observed
    ///
    /// A deadline already in the past completes immediately, unless the flag
    /// is already set.
    #[instrument(
        name = "waiter_wait_until",
        skip(self, cancel, log),
        fields(mode = %log.mode())
    )]
    pub async fn wait_until(
        &self,
        deadline: Instant,
        cancel: &CancellationFlag,
        log: &ModeLog,
    ) -> WaitOutcome {
        let remaining = deadline.saturating_duration_since(Instant::now());
        log.info(format!(
            "Waiting {} ms until send time...",
            remaining.as_millis()
        ));

        let mut next_countdown = self.countdown_interval.map(|i| Instant::now() + i);

        loop {
            if cancel.is_cancelled() {
                log.warn("Wait cancelled.");
                return WaitOutcome::Cancelled;
            }

            let now = Instant::now();
            if now >= deadline {
                log.info("Send time reached.");
                return WaitOutcome::Completed;
            }

            if let (Some(at), Some(interval)) = (next_countdown, self.countdown_interval) {
                if now >= at {
                    log.info(format!(
                        "Time remaining: {} ms",
                        (deadline - now).as_millis()
                    ));
                    next_countdown = Some(now + interval);
                }
            }

            let slice = self.poll_interval.min(deadline - now);
            tokio::time::sleep(slice).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{RecordingShell, RunMode};
    use std::sync::Arc;

    fn waiter() -> CancellableWaiter {
        CancellableWaiter::new(Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_at_deadline() {
        let start = Instant::now();
        let deadline = start + Duration::from_millis(1_234);
        let outcome = waiter()
            .wait_until(
                deadline,
                &CancellationFlag::new(),
                &ModeLog::detached(RunMode::Scheduled),
            )
            .await;

        assert_eq!(outcome, WaitOutcome::Completed);
        assert!(Instant::now() >= deadline);
        // the last slice is clipped to the deadline
        assert!(Instant::now() - start < Duration::from_millis(1_240));
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_deadline_completes_immediately() {
        let start = Instant::now();
        let outcome = waiter()
            .wait_until(
                start,
                &CancellationFlag::new(),
                &ModeLog::detached(RunMode::Scheduled),
            )
            .await;
        assert_eq!(outcome, WaitOutcome::Completed);
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_returns_without_sleeping() {
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let start = Instant::now();
        let outcome = waiter()
            .wait_until(
                start + Duration::from_secs(60),
                &cancel,
                &ModeLog::detached(RunMode::Scheduled),
            )
            .await;
        assert_eq!(outcome, WaitOutcome::Cancelled);
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_observed_within_one_interval() {
        let cancel = CancellationFlag::new();
        let start = Instant::now();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_050)).await;
            trigger.cancel();
        });

        let outcome = waiter()
            .wait_until(
                start + Duration::from_secs(3 * 3600),
                &cancel,
                &ModeLog::detached(RunMode::Scheduled),
            )
            .await;

        assert_eq!(outcome, WaitOutcome::Cancelled);
        let elapsed = Instant::now() - start;
        assert!(elapsed >= Duration::from_millis(1_050));
        assert!(elapsed <= Duration::from_millis(1_150), "took {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_lines() {
        let shell = Arc::new(RecordingShell::new());
        let log = ModeLog::new(RunMode::Scheduled, shell.clone());

        let outcome = waiter()
            .with_countdown(Some(Duration::from_secs(1)))
            .wait_until(
                Instant::now() + Duration::from_millis(3_500),
                &CancellationFlag::new(),
                &log,
            )
            .await;

        assert_eq!(outcome, WaitOutcome::Completed);
        let lines = shell.lines(RunMode::Scheduled);
        assert!(lines[0].starts_with("Waiting 3500 ms"));
        let countdown = lines
            .iter()
            .filter(|l| l.starts_with("Time remaining"))
            .count();
        assert_eq!(countdown, 3);
        assert_eq!(lines.last().map(String::as_str), Some("Send time reached."));
    }
}
