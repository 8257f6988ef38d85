//! Mock 传输层
//!
//! 用于测试与 `--dry-run` 的 mock 实现，支持注入失败场景与延迟。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use contracts::{
    HttpResponse, HttpTransport, NetworkError, ReachabilityProbe, TimeTransport, TransportError,
    UnlockRequest,
};
use tokio::time::Instant;

/// Body of a granted unlock response
pub const GRANTED_BODY: &str = r#"{"code":0,"msg":"success","data":{"apply_result":1}}"#;
/// Body of a "try again" unlock response
pub const NOT_GRANTED_BODY: &str = r#"{"code":0,"msg":"success","data":{"apply_result":3}}"#;

/// Time transport answering a fixed authoritative time
///
/// The answer advances with the tokio clock, so repeated queries stay consistent
/// under paused time.
#[derive(Debug)]
pub struct MockClock {
    epoch_ms: i64,
    anchor: Instant,
    /// 应该失败的服务器
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl MockClock {
    pub fn new(epoch_ms: i64) -> Self {
        Self {
            epoch_ms,
            anchor: Instant::now(),
            failing: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Servers in `failing` time out
    pub fn with_failing(mut self, failing: &[&str]) -> Self {
        self.failing = failing.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Servers queried so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TimeTransport for MockClock {
    async fn query_time(&self, server: &str, timeout: Duration) -> Result<i64, NetworkError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(server.to_string());

        if self.failing.iter().any(|s| s == server) {
            return Err(NetworkError::Timeout {
                server: server.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        let elapsed = self.anchor.elapsed().as_millis() as i64;
        Ok(self.epoch_ms + elapsed)
    }
}

/// Reachability probe with a fixed round-trip delay
#[derive(Debug)]
pub struct MockProbe {
    delay: Duration,
    reachable: bool,
    calls: AtomicU32,
}

impl MockProbe {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            reachable: true,
            calls: AtomicU32::new(0),
        }
    }

    /// Probe that never succeeds (after the delay)
    pub fn unreachable(delay: Duration) -> Self {
        Self {
            reachable: false,
            ..Self::new(delay)
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ReachabilityProbe for MockProbe {
    async fn is_reachable(&self, _host: &str, _timeout: Duration) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.reachable
    }
}

/// HTTP transport replaying a script; once exhausted, the fallback reply repeats
#[derive(Debug)]
pub struct MockHttp {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    fallback: Result<HttpResponse, TransportError>,
    delay: Duration,
    /// 触发 panic 的调用序号 (从 1 开始)
    panic_on_call: Option<u32>,
    calls: AtomicU32,
    sent: Mutex<Vec<(Instant, UnlockRequest)>>,
}

impl MockHttp {
    /// Transport that always grants
    pub fn granting() -> Self {
        Self::scripted(Vec::new(), Ok(HttpResponse::new(200, GRANTED_BODY)))
    }

    pub fn scripted(
        script: Vec<Result<HttpResponse, TransportError>>,
        fallback: Result<HttpResponse, TransportError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            panic_on_call: None,
            calls: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Simulated round-trip time per request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Panic inside the `n`-th send (1-based)
    pub fn with_panic_on_call(mut self, n: u32) -> Self {
        self.panic_on_call = Some(n);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests sent so far with the tokio instant at which each was sent
    pub fn sent(&self) -> Vec<(Instant, UnlockRequest)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl HttpTransport for MockHttp {
    async fn send(&self, request: &UnlockRequest) -> Result<HttpResponse, TransportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((Instant::now(), request.clone()));

        if self.panic_on_call == Some(n) {
            panic!("mock transport failure on call {n}");
        }

        let reply = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        tokio::time::sleep(self.delay).await;
        reply
    }
}
