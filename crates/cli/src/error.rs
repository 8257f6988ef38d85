//! Error types for CLI operations.

use contracts::ContractError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or failed validation
    #[error("Invalid configuration: {0}")]
    Config(#[from] ContractError),

    /// No credential given on the command line or in the environment
    #[error("No cookie provided: pass --cookie or set UNLOCK_COOKIE")]
    MissingCookie,

    /// Run ended without success
    #[error("Run did not succeed: {report}")]
    RunFailed { report: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn run_failed(report: impl ToString) -> Self {
        Self::RunFailed {
            report: report.to_string(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
