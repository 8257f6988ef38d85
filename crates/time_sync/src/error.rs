//! Time sync error types

use thiserror::Error;

/// Failures that abort a scheduling cycle
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeSyncError {
    /// Every configured time authority failed
    #[error("time unavailable: all {servers} time server(s) failed")]
    TimeUnavailable { servers: usize },

    /// Computed send instant is not after the authoritative time
    #[error(
        "send instant {send_epoch_ms} is not after authoritative time {authoritative_epoch_ms}"
    )]
    PastDeadline {
        send_epoch_ms: i64,
        authoritative_epoch_ms: i64,
    },

    /// Authoritative time cannot be represented as a calendar date
    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),

    /// No valid local instant for the rule within the search horizon
    #[error("no valid arrival instant found for {time_of_day} in {zone}")]
    NoArrivalInstant { time_of_day: String, zone: String },
}
