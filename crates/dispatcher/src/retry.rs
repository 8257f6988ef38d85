//! RetryScheduler - attempt loop over a [`Dispatch`] implementation

use std::time::Duration;

use contracts::{
    AttemptOutcome, CancellationFlag, FinalOutcome, ModeLog, RetryConfig, RetryPolicy, RunMode,
};
use tracing::{debug, instrument};

use crate::dispatcher::Dispatch;

/// Attempting → Stopped(success | terminal | cancelled | gave up)
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    policy: RetryPolicy,
    inter_attempt_delay: Duration,
    max_attempts: Option<u32>,
}

impl RetryScheduler {
    pub fn new(policy: RetryPolicy, inter_attempt_delay: Duration) -> Self {
        Self {
            policy,
            inter_attempt_delay,
            max_attempts: None,
        }
    }

    /// Scheduler for `mode` as configured
    pub fn for_mode(config: &RetryConfig, mode: RunMode) -> Self {
        Self::new(config.policy_for(mode), config.inter_attempt_delay())
            .with_max_attempts(config.attempt_cap())
    }

    /// Cap the number of attempts under continuous retry (`None` = unlimited)
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run attempts until success, terminal failure, cancellation, or the policy gives up
    ///
    /// Cancellation is checked at loop entry; a delay already in progress runs
    /// to completion but the next attempt is skipped.
    #[instrument(
        name = "retry_scheduler_run",
        skip(self, dispatcher, credential, cancel, log),
        fields(mode = %log.mode(), policy = ?self.policy)
    )]
    pub async fn run<D: Dispatch + Sync>(
        &self,
        dispatcher: &D,
        credential: &str,
        cancel: &CancellationFlag,
        log: &ModeLog,
    ) -> FinalOutcome {
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                log.warn("Process stopped by user.");
                return FinalOutcome::Cancelled { attempts };
            }

            let is_retry = attempts > 0;
            attempts += 1;
            debug!(attempt = attempts, is_retry, "Dispatching");

            let reason = match dispatcher.dispatch(credential, is_retry, log).await {
                AttemptOutcome::Success => return FinalOutcome::Success { attempts },
                AttemptOutcome::TerminalFailure(reason) => {
                    return FinalOutcome::TerminalFailure { reason, attempts }
                }
                AttemptOutcome::RetryableFailure(reason) => reason,
            };

            let capped = self.max_attempts.is_some_and(|max| attempts >= max);
            if self.policy == RetryPolicy::SingleAttempt || capped {
                return FinalOutcome::GaveUp {
                    last: reason,
                    attempts,
                };
            }

            log.info(format!(
                "Retrying in {} ms...",
                self.inter_attempt_delay.as_millis()
            ));
            tokio::time::sleep(self.inter_attempt_delay).await;
        }
    }
}
