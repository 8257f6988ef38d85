//! TimeSource - first-success query over an ordered list of time authorities

use std::time::Duration;

use contracts::{AuthoritativeTime, ModeLog, TimeTransport};
use tokio::time::Instant;
use tracing::instrument;

use crate::TimeSyncError;

/// Queries time authorities in order and returns the first successful answer
#[derive(Debug)]
pub struct TimeSource<T: TimeTransport> {
    transport: T,
    query_timeout: Duration,
}

impl<T: TimeTransport> TimeSource<T> {
    pub fn new(transport: T, query_timeout: Duration) -> Self {
        Self {
            transport,
            query_timeout,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch a fresh authoritative time
    ///
    /// Servers after the first success are never queried. Nothing is cached
    /// between calls.
    ///
    /// # Errors
    /// `TimeUnavailable` when every server failed (each is tried exactly once).
    #[instrument(
        name = "time_source_fetch",
        skip(self, servers, log),
        fields(servers = servers.len(), mode = %log.mode())
    )]
    pub async fn fetch_authoritative_time(
        &self,
        servers: &[String],
        log: &ModeLog,
    ) -> Result<AuthoritativeTime, TimeSyncError> {
        for server in servers {
            log.info(format!("Querying NTP server: {server}"));

            match self.transport.query_time(server, self.query_timeout).await {
                Ok(epoch_ms) => {
                    let observed_at = Instant::now();
                    observability::record_time_sync(server, true);
                    log.info(format!("NTP time synchronized successfully from {server}"));
                    return Ok(AuthoritativeTime::new(epoch_ms, server.as_str(), observed_at));
                }
                Err(e) => {
                    observability::record_time_sync(server, false);
                    log.warn(format!("Failed to get time from {server}: {e}"));
                }
            }
        }

        log.error("All NTP servers failed. Aborting scheduled process.");
        Err(TimeSyncError::TimeUnavailable {
            servers: servers.len(),
        })
    }
}
