//! Controller error types

use contracts::{ContractError, RunMode};
use dispatcher::DispatcherError;
use thiserror::Error;
use time_sync::TimeSyncError;

/// ProcessController specific error
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Start rejected: credential is empty
    #[error("credential is empty")]
    EmptyCredential,

    /// Start rejected: no async runtime to run the worker on
    #[error("no tokio runtime available to start the {mode} worker")]
    NoRuntime { mode: RunMode },

    /// Scheduling cycle aborted (time unavailable, past deadline)
    #[error(transparent)]
    TimeSync(#[from] TimeSyncError),

    /// Worker task panicked or was aborted
    #[error("{mode} worker terminated abnormally: {message}")]
    WorkerFailed { mode: RunMode, message: String },

    /// Configuration could not be applied
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// HTTP client construction failed
    #[error(transparent)]
    Dispatcher(#[from] DispatcherError),
}

/// Result alias
pub type Result<T> = std::result::Result<T, ControllerError>;
