//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the unlock scheduler.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Authoritative time is Unix epoch milliseconds (`i64`) taken from an external clock
//! - Local waiting is driven by the tokio monotonic clock, anchored at the instant the
//!   authoritative reply was observed

mod blueprint;
mod error;
mod outcome;
mod run;
mod schedule_rule;
mod shell;
mod time;
mod transport;

pub use blueprint::*;
pub use error::*;
pub use outcome::*;
pub use run::*;
pub use schedule_rule::*;
pub use shell::*;
pub use time::*;
pub use transport::*;
