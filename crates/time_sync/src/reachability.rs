//! TcpReachability - connectivity check via TCP connect

use std::io::ErrorKind;
use std::time::Duration;

use contracts::ReachabilityProbe;
use tokio::net::TcpStream;
use tracing::{debug, instrument};

/// Reachability probe that opens (and immediately drops) a TCP connection
///
/// `host` must be `host:port`. A refused connection still counts as reachable:
/// the host answered.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpReachability;

impl ReachabilityProbe for TcpReachability {
    #[instrument(name = "tcp_reachability_probe", skip(self, timeout))]
    async fn is_reachable(&self, host: &str, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, TcpStream::connect(host)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => true,
            Ok(Err(e)) => {
                debug!(error = %e, "Probe failed");
                false
            }
            Err(_) => {
                debug!(timeout_ms = timeout.as_millis() as u64, "Probe timed out");
                false
            }
        }
    }
}
