//! Transport traits - the opaque network capabilities the core depends on
//!
//! Concrete implementations live in `time_sync` (SNTP, TCP reachability) and
//! `dispatcher` (HTTPS). Tests substitute stubs.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failure of a single time-authority query
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Host name could not be resolved
    #[error("cannot resolve '{server}': {message}")]
    Resolve { server: String, message: String },

    /// No reply within the query timeout
    #[error("no reply from '{server}' within {timeout_ms}ms")]
    Timeout { server: String, timeout_ms: u64 },

    /// Reply received but unusable
    #[error("invalid reply from '{server}': {message}")]
    InvalidReply { server: String, message: String },

    /// Socket error
    #[error("io error talking to '{server}': {source}")]
    Io {
        server: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of the unlock request before a response was read
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("io error: {0}")]
    Io(String),
}

/// Time-synchronization transport
#[trait_variant::make(TimeTransport: Send)]
pub trait LocalTimeTransport {
    /// Query one endpoint, returning its transmit time in Unix epoch milliseconds
    async fn query_time(&self, server: &str, timeout: Duration) -> Result<i64, NetworkError>;
}

/// Connectivity check used to estimate latency
#[trait_variant::make(ReachabilityProbe: Send)]
pub trait LocalReachabilityProbe {
    /// `true` when the host answered within `timeout`
    async fn is_reachable(&self, host: &str, timeout: Duration) -> bool;
}

/// HTTP transport for the unlock request
#[trait_variant::make(HttpTransport: Send)]
pub trait LocalHttpTransport {
    async fn send(&self, request: &UnlockRequest) -> Result<HttpResponse, TransportError>;
}

/// One unlock request, fully described
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockRequest {
    pub url: String,
    pub user_agent: String,
    /// Raw credential, sent verbatim as the `Cookie` header
    pub cookie: String,
    pub is_retry: bool,
}

#[derive(Serialize)]
struct UnlockBody {
    is_retry: bool,
}

impl UnlockRequest {
    /// JSON body: `{"is_retry":<bool>}`
    pub fn body_json(&self) -> String {
        serde_json::to_string(&UnlockBody {
            is_retry: self.is_retry,
        })
        .unwrap_or_else(|_| format!("{{\"is_retry\":{}}}", self.is_retry))
    }
}

/// Status and raw body of an HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
