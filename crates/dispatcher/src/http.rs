//! ReqwestTransport - HTTPS transport for the unlock request

use std::time::Duration;

use contracts::{HttpResponse, HttpTransport, TransportError, UnlockRequest};
use reqwest::header::{CONTENT_TYPE, COOKIE, USER_AGENT};
use tracing::{debug, instrument};

use crate::error::DispatcherError;

/// `reqwest` client wrapper
///
/// The client is built once and reused across attempts (connection pool).
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// `timeout = None` keeps the transport default (no overall timeout)
    pub fn new(timeout: Option<Duration>) -> Result<Self, DispatcherError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| DispatcherError::client_build(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    #[instrument(name = "reqwest_send", skip(self, request), fields(is_retry = request.is_retry))]
    async fn send(&self, request: &UnlockRequest) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(&request.url)
            .header(USER_AGENT, &request.user_agent)
            .header(COOKIE, &request.cookie)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(request.body_json())
            .send()
            .await
            .map_err(map_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_error)?;
        debug!(status, bytes = body.len(), "Response received");

        Ok(HttpResponse::new(status, body))
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Io(e.to_string())
    }
}
