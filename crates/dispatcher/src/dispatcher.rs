//! RequestDispatcher - one unlock request, classified

use std::sync::Arc;

use contracts::{
    AttemptOutcome, HttpTransport, ModeLog, RequestConfig, TransportError, UnlockRequest,
};
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::classifier::ResponseClassifier;
use crate::metrics::DispatchMetrics;

/// Something that performs one classified attempt
///
/// Implemented by [`RequestDispatcher`]; the retry loop only needs this.
#[trait_variant::make(Dispatch: Send)]
pub trait LocalDispatch {
    async fn dispatch(&self, credential: &str, is_retry: bool, log: &ModeLog) -> AttemptOutcome;
}

/// Sends the unlock request over an injected transport and classifies the reply
#[derive(Debug)]
pub struct RequestDispatcher<H: HttpTransport> {
    transport: H,
    classifier: ResponseClassifier,
    url: String,
    user_agent: String,
    metrics: Arc<DispatchMetrics>,
}

impl<H: HttpTransport> RequestDispatcher<H> {
    pub fn new(transport: H, classifier: ResponseClassifier, request: &RequestConfig) -> Self {
        Self {
            transport,
            classifier,
            url: request.url.clone(),
            user_agent: request.user_agent.clone(),
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    pub fn transport(&self) -> &H {
        &self.transport
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    fn build_request(&self, credential: &str, is_retry: bool) -> UnlockRequest {
        UnlockRequest {
            url: self.url.clone(),
            user_agent: self.user_agent.clone(),
            cookie: credential.to_string(),
            is_retry,
        }
    }
}

impl<H: HttpTransport + Sync> Dispatch for RequestDispatcher<H> {
    #[instrument(
        name = "dispatcher_dispatch",
        skip(self, credential, log),
        fields(mode = %log.mode())
    )]
    async fn dispatch(&self, credential: &str, is_retry: bool, log: &ModeLog) -> AttemptOutcome {
        let request = self.build_request(credential, is_retry);
        log.info("Sending request...");

        let start = Instant::now();
        let result = self.transport.send(&request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let outcome = self.classifier.classify(&result);
        let status = result.as_ref().ok().map(|r| r.status);

        let line = match (&result, &outcome) {
            (Err(e), _) => describe_transport(e, duration_ms),
            (Ok(response), outcome) => format!(
                "HTTP {}: {outcome} (Duration: {duration_ms} ms)",
                response.status
            ),
        };
        match &outcome {
            AttemptOutcome::Success => log.info(line),
            AttemptOutcome::RetryableFailure(_) => log.warn(line),
            AttemptOutcome::TerminalFailure(_) => log.error(line),
        }

        debug!(
            status = ?status,
            duration_ms,
            outcome = outcome.label(),
            is_retry,
            "Attempt classified"
        );
        self.metrics.record(&outcome, duration_ms);
        observability::record_attempt(outcome.label(), duration_ms, status);

        outcome
    }
}

fn describe_transport(error: &TransportError, duration_ms: u64) -> String {
    format!("Connection failure: {error} (Duration: {duration_ms} ms). Check your internet connection.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{HttpResponse, RecordingShell, RetryReason, RunMode, TerminalReason};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Transport that replies from a queue and records requests
    #[derive(Default)]
    struct QueueTransport {
        replies: Mutex<Vec<Result<HttpResponse, TransportError>>>,
        sent: Mutex<Vec<UnlockRequest>>,
        delay: Duration,
    }

    impl HttpTransport for QueueTransport {
        async fn send(&self, request: &UnlockRequest) -> Result<HttpResponse, TransportError> {
            self.sent.lock().unwrap().push(request.clone());
            let reply = self.replies.lock().unwrap().remove(0);
            tokio::time::sleep(self.delay).await;
            reply
        }
    }

    fn dispatcher(replies: Vec<Result<HttpResponse, TransportError>>) -> RequestDispatcher<QueueTransport> {
        RequestDispatcher::new(
            QueueTransport {
                replies: Mutex::new(replies),
                delay: Duration::from_millis(35),
                ..Default::default()
            },
            ResponseClassifier::default(),
            &RequestConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_builds_request_and_logs() {
        let shell = Arc::new(RecordingShell::new());
        let log = ModeLog::new(RunMode::Manual, shell.clone());
        let dispatcher = dispatcher(vec![Ok(HttpResponse::new(
            200,
            r#"{"code":0,"data":{"apply_result":1}}"#,
        ))]);

        let outcome = Dispatch::dispatch(&dispatcher, "token=1", false, &log).await;
        assert_eq!(outcome, AttemptOutcome::Success);

        let sent = dispatcher.transport().sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].cookie, "token=1");
        assert_eq!(sent[0].user_agent, "okhttp/4.12.0");
        assert!(!sent[0].is_retry);

        assert!(shell.contains(
            RunMode::Manual,
            "HTTP 200: success, permission granted"
        ));
        assert!(shell.contains(RunMode::Manual, "Duration: 3"));
        assert!(!shell.contains(RunMode::Manual, "token=1"));
        assert_eq!(dispatcher.metrics().snapshot().successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_classifies_failures() {
        let shell = Arc::new(RecordingShell::new());
        let log = ModeLog::new(RunMode::Scheduled, shell.clone());
        let dispatcher = dispatcher(vec![
            Err(TransportError::Connect("refused".into())),
            Ok(HttpResponse::new(200, r#"{"code":20036,"msg":""}"#)),
        ]);

        assert!(matches!(
            Dispatch::dispatch(&dispatcher, "c", true, &log).await,
            AttemptOutcome::RetryableFailure(RetryReason::Transport(_))
        ));
        assert_eq!(
            Dispatch::dispatch(&dispatcher, "c", true, &log).await,
            AttemptOutcome::TerminalFailure(TerminalReason::NotEligible { code: 20036 })
        );

        let snapshot = dispatcher.metrics().snapshot();
        assert_eq!(snapshot.attempts, 2);
        assert_eq!(snapshot.retryable_failures, 1);
        assert_eq!(snapshot.terminal_failures, 1);

        assert!(shell.contains(RunMode::Scheduled, "Connection failure: "));
        assert!(shell.contains(
            RunMode::Scheduled,
            "HTTP 200: stopped: account not eligible (code 20036)"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_line_carries_error_status() {
        let shell = Arc::new(RecordingShell::new());
        let log = ModeLog::new(RunMode::Manual, shell.clone());
        let dispatcher = dispatcher(vec![Ok(HttpResponse::new(503, "busy"))]);

        assert_eq!(
            Dispatch::dispatch(&dispatcher, "c", false, &log).await,
            AttemptOutcome::RetryableFailure(RetryReason::HttpStatus(503))
        );
        assert!(shell.contains(RunMode::Manual, "HTTP 503: failed: HTTP status 503"));
    }
}
