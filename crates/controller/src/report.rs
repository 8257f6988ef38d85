//! RunReport - what a finished worker hands back

use std::fmt;
use std::time::Duration;

use contracts::{FinalOutcome, RunMode};

use crate::error::ControllerError;

/// Result of calling `start_mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A worker was scheduled
    Started,
    /// The mode was already running; nothing was scheduled
    AlreadyRunning,
}

/// Outcome of one worker run
#[derive(Debug)]
pub struct RunReport {
    pub mode: RunMode,
    /// `Err` when the cycle was aborted before or instead of dispatching
    pub result: Result<FinalOutcome, ControllerError>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(&self.result, Ok(outcome) if outcome.is_success())
    }

    /// Label for metrics: the final outcome label or `aborted`
    pub fn label(&self) -> &'static str {
        match &self.result {
            Ok(outcome) => outcome.label(),
            Err(_) => "aborted",
        }
    }

    pub fn attempts(&self) -> u32 {
        self.result.as_ref().map_or(0, FinalOutcome::attempts)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.result {
            Ok(outcome) => write!(f, "[{}] {outcome}", self.mode),
            Err(e) => write!(f, "[{}] ABORTED: {e}", self.mode),
        }?;
        write!(f, " in {:.3}s", self.elapsed.as_secs_f64())
    }
}
