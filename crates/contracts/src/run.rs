//! Run modes, run state and the cooperative cancellation flag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Independent, separately start/stop-able execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Sync time, wait for the computed send instant, then dispatch
    Scheduled,
    /// Dispatch immediately
    Manual,
}

impl RunMode {
    /// Every mode, in display order
    pub const ALL: [RunMode; 2] = [RunMode::Scheduled, RunMode::Manual];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Scheduled => "scheduled",
            RunMode::Manual => "manual",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RunState {
    #[default]
    Idle = 0,
    /// Syncing time, probing latency or waiting for the send instant
    Waiting = 1,
    /// At least one unlock request is being dispatched
    Dispatching = 2,
    /// Stop requested; the worker resets to `Idle` once it has drained
    Stopped = 3,
}

impl RunState {
    /// Decode the representation stored in an `AtomicU8`
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => RunState::Waiting,
            2 => RunState::Dispatching,
            3 => RunState::Stopped,
            _ => RunState::Idle,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Waiting => "waiting",
            RunState::Dispatching => "dispatching",
            RunState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Cooperative cancellation flag shared between the controller and one worker.
///
/// Clones observe the same flag. Only the controller calls [`cancel`](Self::cancel);
/// scheduler components poll [`is_cancelled`](Self::is_cancelled).
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
