//! AttemptOutcome / FinalOutcome - RequestDispatcher and RetryScheduler output

use std::fmt;

/// Why an attempt may succeed if repeated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    /// Connect / timeout / IO failure before a response was read
    Transport(String),
    /// Non-success HTTP status
    HttpStatus(u16),
    /// Response body is not a JSON object
    ParseError(String),
    /// Application code other than 0
    ApiError { code: i64, message: String },
    /// `apply_result == 3`, the server's "try again" signal
    NotGranted,
    /// Missing payload or unrecognized result flag, raw body kept for diagnosis
    Unknown { body: String },
}

impl RetryReason {
    /// Short label for metrics and structured logs
    pub fn label(&self) -> &'static str {
        match self {
            RetryReason::Transport(_) => "transport",
            RetryReason::HttpStatus(_) => "http_status",
            RetryReason::ParseError(_) => "parse_error",
            RetryReason::ApiError { .. } => "api_error",
            RetryReason::NotGranted => "not_granted",
            RetryReason::Unknown { .. } => "unknown",
        }
    }
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryReason::Transport(message) => write!(f, "connection failure: {message}"),
            RetryReason::HttpStatus(status) => write!(f, "HTTP status {status}"),
            RetryReason::ParseError(message) => {
                write!(f, "failed to parse server response: {message}")
            }
            RetryReason::ApiError { code, message } => {
                write!(f, "API error code {code} ({message})")
            }
            RetryReason::NotGranted => f.write_str("permission not granted (result code 3)"),
            RetryReason::Unknown { body } => write!(f, "unknown result, response: {body}"),
        }
    }
}

/// Why retrying cannot change the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalReason {
    /// Business-rule rejection of the account
    NotEligible { code: i64 },
    /// Credential rejected by the server
    AuthInvalid { message: String },
}

impl TerminalReason {
    pub fn label(&self) -> &'static str {
        match self {
            TerminalReason::NotEligible { .. } => "not_eligible",
            TerminalReason::AuthInvalid { .. } => "auth_invalid",
        }
    }
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalReason::NotEligible { code } => {
                write!(f, "account not eligible (code {code})")
            }
            TerminalReason::AuthInvalid { message } => {
                write!(f, "credential rejected ({message})")
            }
        }
    }
}

/// Classified result of one dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure(RetryReason),
    TerminalFailure(TerminalReason),
}

impl AttemptOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::RetryableFailure(reason) => reason.label(),
            AttemptOutcome::TerminalFailure(reason) => reason.label(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Success => f.write_str("success, permission granted"),
            AttemptOutcome::RetryableFailure(reason) => write!(f, "failed: {reason}"),
            AttemptOutcome::TerminalFailure(reason) => write!(f, "stopped: {reason}"),
        }
    }
}

/// Result of a whole retry loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalOutcome {
    Success {
        attempts: u32,
    },
    TerminalFailure {
        reason: TerminalReason,
        attempts: u32,
    },
    /// Policy allowed no further attempts after a retryable failure
    GaveUp {
        last: RetryReason,
        attempts: u32,
    },
    /// Cancellation observed at an attempt boundary
    Cancelled {
        attempts: u32,
    },
}

impl FinalOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            FinalOutcome::Success { attempts }
            | FinalOutcome::TerminalFailure { attempts, .. }
            | FinalOutcome::GaveUp { attempts, .. }
            | FinalOutcome::Cancelled { attempts } => *attempts,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FinalOutcome::Success { .. } => "success",
            FinalOutcome::TerminalFailure { .. } => "terminal_failure",
            FinalOutcome::GaveUp { .. } => "gave_up",
            FinalOutcome::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FinalOutcome::Success { .. })
    }
}

impl fmt::Display for FinalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalOutcome::Success { attempts } => write!(f, "SUCCESS after {attempts} attempt(s)"),
            FinalOutcome::TerminalFailure { reason, attempts } => {
                write!(f, "FAILED after {attempts} attempt(s): {reason}")
            }
            FinalOutcome::GaveUp { last, attempts } => {
                write!(f, "FAILED after {attempts} attempt(s): {last}")
            }
            FinalOutcome::Cancelled { attempts } => {
                write!(f, "CANCELLED after {attempts} attempt(s)")
            }
        }
    }
}
