//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置文件 → ProcessController 的完整运行
//! - 模拟 e2e 测试（mock 时钟 / 探测 / HTTP，暂停的 tokio 时间）
//! - 本地 HTTP 服务器上的真实请求

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::UnlockBlueprint;

    #[test]
    fn test_default_blueprint_survives_toml() {
        let toml = ConfigLoader::to_toml(&UnlockBlueprint::default()).unwrap();
        assert!(toml.contains("time_zone = \"Asia/Shanghai\""));
        assert!(toml.contains("rollover = \"next_calendar_day\""));

        let reloaded = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(reloaded.classifier.not_eligible_code, 20036);
        assert_eq!(reloaded.time.servers.len(), 4);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        FinalOutcome, HttpResponse, RecordingShell, RetryReason, RunMode, RunState,
        TerminalReason, TransportError, UnlockBlueprint,
    };
    use controller::mock::{MockClock, MockHttp, MockProbe, GRANTED_BODY, NOT_GRANTED_BODY};
    use controller::{ProcessController, StartOutcome};
    use tokio::time::Instant;

    /// 2024-03-10 11:59:00.000 +05:30
    const KOLKATA_BEFORE_NOON: i64 = 1_710_052_140_000;

    fn load(toml: &str) -> UnlockBlueprint {
        ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap()
    }

    fn build(
        blueprint: UnlockBlueprint,
        clock: MockClock,
        probe: MockProbe,
        http: MockHttp,
    ) -> (
        ProcessController<MockClock, MockProbe, MockHttp>,
        Arc<RecordingShell>,
    ) {
        let shell = Arc::new(RecordingShell::new());
        let controller =
            ProcessController::new(blueprint, clock, probe, http, shell.clone()).unwrap();
        (controller, shell)
    }

    /// Config file → sync (with failover) → probe → wait → single request
    #[tokio::test(start_paused = true)]
    async fn test_e2e_scheduled_run_from_config() {
        let blueprint = load(
            r#"
            [time]
            servers = ["ntp-primary", "ntp-backup"]

            [latency]
            samples = 2

            [schedule]
            time_of_day = "12:00:00.500"
            time_zone = "Asia/Kolkata"
            rollover = "next_occurrence"

            [wait]
            countdown_log_interval_ms = 0
            "#,
        );
        let clock = MockClock::new(KOLKATA_BEFORE_NOON).with_failing(&["ntp-primary"]);
        let (controller, shell) = build(
            blueprint,
            clock,
            MockProbe::new(Duration::from_millis(40)),
            MockHttp::granting(),
        );
        let start = Instant::now();

        controller.start_mode(RunMode::Scheduled, " serviceToken=abc ").unwrap();
        let report = controller.join(RunMode::Scheduled).await.unwrap();

        assert!(report.is_success(), "{report}");
        assert_eq!(
            controller.time_source().transport().calls(),
            vec!["ntp-primary", "ntp-backup"]
        );
        assert_eq!(controller.latency_probe().probe().calls(), 2);

        let sent = controller.dispatcher().transport().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.cookie, "serviceToken=abc");

        // arrival 60.5 s after sync, sent 40 ms early
        let offset = sent[0].0 - start;
        assert!(offset >= Duration::from_millis(60_460), "{offset:?}");
        assert!(offset < Duration::from_millis(60_470), "{offset:?}");

        assert!(shell.contains(
            RunMode::Scheduled,
            "Target Arrival Time: 2024-03-10 12:00:00.500 IST"
        ));
        assert!(shell.contains(RunMode::Scheduled, "Failed to get time from ntp-primary"));
        assert!(shell.contains(RunMode::Scheduled, "Process Finished: SUCCESS!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_manual_retry_respects_attempt_cap() {
        let blueprint = load(
            r#"
            [retry]
            manual = "continuous_retry"
            inter_attempt_delay_ms = 100
            max_attempts = 3
            "#,
        );
        let http = MockHttp::scripted(Vec::new(), Ok(HttpResponse::new(200, NOT_GRANTED_BODY)));
        let (controller, shell) = build(
            blueprint,
            MockClock::new(0),
            MockProbe::new(Duration::ZERO),
            http,
        );
        let start = Instant::now();

        controller.start_mode(RunMode::Manual, "c").unwrap();
        let report = controller.join(RunMode::Manual).await.unwrap();

        assert!(matches!(
            report.result,
            Ok(FinalOutcome::GaveUp {
                last: RetryReason::NotGranted,
                attempts: 3
            })
        ));
        assert!(Instant::now() - start >= Duration::from_millis(200));

        let flags: Vec<bool> = controller
            .dispatcher()
            .transport()
            .sent()
            .into_iter()
            .map(|(_, request)| request.is_retry)
            .collect();
        assert_eq!(flags, vec![false, true, true]);
        assert_eq!(
            shell
                .lines(RunMode::Manual)
                .iter()
                .filter(|l| l.starts_with("Retrying in 100 ms"))
                .count(),
            2
        );
        assert_eq!(controller.dispatcher().metrics().snapshot().attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_terminal_reply_ends_continuous_retry() {
        let blueprint = load("[retry]\nmanual = \"continuous_retry\"\n");
        let http = MockHttp::scripted(
            vec![Err(TransportError::Timeout("slow".into()))],
            Ok(HttpResponse::new(200, r#"{"code":20036,"msg":"not eligible"}"#)),
        );
        let (controller, _shell) = build(
            blueprint,
            MockClock::new(0),
            MockProbe::new(Duration::ZERO),
            http,
        );

        controller.start_mode(RunMode::Manual, "c").unwrap();
        let report = controller.join(RunMode::Manual).await.unwrap();

        assert_eq!(
            report.result.unwrap(),
            FinalOutcome::TerminalFailure {
                reason: TerminalReason::NotEligible { code: 20036 },
                attempts: 2
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_e2e_configured_precedence_changes_classification() {
        let body = r#"{"code":100004,"msg":"Please login again"}"#;

        let default_order = load("[retry]\nmanual = \"continuous_retry\"\n");
        let (controller, _) = build(
            default_order,
            MockClock::new(0),
            MockProbe::new(Duration::ZERO),
            MockHttp::scripted(Vec::new(), Ok(HttpResponse::new(200, body))),
        );
        controller.start_mode(RunMode::Manual, "c").unwrap();
        let report = controller.join(RunMode::Manual).await.unwrap();
        assert!(matches!(
            report.result,
            Ok(FinalOutcome::TerminalFailure {
                reason: TerminalReason::AuthInvalid { .. },
                attempts: 1
            })
        ));

        let api_error_first = load(
            r#"
            [classifier]
            precedence = ["api_error", "not_eligible", "auth_keyword"]

            [retry]
            manual = "continuous_retry"
            max_attempts = 2
            "#,
        );
        let (controller, _) = build(
            api_error_first,
            MockClock::new(0),
            MockProbe::new(Duration::ZERO),
            MockHttp::scripted(Vec::new(), Ok(HttpResponse::new(200, body))),
        );
        controller.start_mode(RunMode::Manual, "c").unwrap();
        let report = controller.join(RunMode::Manual).await.unwrap();
        assert!(matches!(
            report.result,
            Ok(FinalOutcome::GaveUp {
                last: RetryReason::ApiError { code: 100004, .. },
                attempts: 2
            })
        ));
    }

    /// Both modes at once; stopping one leaves the other untouched
    #[tokio::test(start_paused = true)]
    async fn test_e2e_modes_run_concurrently() {
        let blueprint = load(
            r#"
            [retry]
            manual = "continuous_retry"

            [wait]
            countdown_log_interval_ms = 0
            "#,
        );
        let http = MockHttp::scripted(Vec::new(), Err(TransportError::Connect("refused".into())));
        let (controller, shell) = build(
            blueprint,
            // 2024-05-01 12:00:00 +08:00, twelve hours before the default arrival
            MockClock::new(1_714_536_000_000),
            MockProbe::new(Duration::from_millis(50)),
            http,
        );

        assert_eq!(
            controller.start_mode(RunMode::Scheduled, "c").unwrap(),
            StartOutcome::Started
        );
        assert_eq!(
            controller.start_mode(RunMode::Manual, "c").unwrap(),
            StartOutcome::Started
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(controller.state(RunMode::Scheduled), RunState::Waiting);
        assert_eq!(controller.state(RunMode::Manual), RunState::Dispatching);

        assert!(controller.stop_mode(RunMode::Manual));
        let manual = controller.join(RunMode::Manual).await.unwrap();
        assert!(matches!(manual.result, Ok(FinalOutcome::Cancelled { .. })));
        assert!(controller.is_running(RunMode::Scheduled));

        let reports = controller.shutdown().await;
        assert_eq!(reports.len(), 1);
        assert!(matches!(
            reports[0].result,
            Ok(FinalOutcome::Cancelled { attempts: 0 })
        ));

        // manual made attempts; scheduled never got to send
        let sent = controller.dispatcher().transport().sent();
        assert!(sent.len() >= 2);
        assert!(shell.lines(RunMode::Scheduled).iter().all(|l| !l.contains("Sending request")));
        assert_eq!(
            shell.state_changes(),
            vec![
                (RunMode::Scheduled, true),
                (RunMode::Manual, true),
                (RunMode::Manual, false),
                (RunMode::Scheduled, false),
            ]
        );
    }

    #[tokio::test]
    async fn test_e2e_granted_body_constant_classifies_as_success() {
        let classifier = dispatcher::ResponseClassifier::default();
        assert!(classifier
            .classify_response(&HttpResponse::new(200, GRANTED_BODY))
            .is_success());
    }
}

#[cfg(test)]
mod http_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{FinalOutcome, RecordingShell, RunMode, UnlockBlueprint};
    use controller::mock::{MockClock, MockProbe, NOT_GRANTED_BODY, GRANTED_BODY};
    use controller::ProcessController;
    use dispatcher::ReqwestTransport;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves one canned JSON body per connection; returns each raw request
    async fn serve(bodies: Vec<&'static str>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/apply", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for body in bodies {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut raw = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = socket.read(&mut buf).await.unwrap();
                    raw.extend_from_slice(&buf[..n]);
                    // request bodies here are a short `{"is_retry":..}` object
                    if n == 0 || raw.ends_with(b"}") {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
                requests.push(String::from_utf8_lossy(&raw).into_owned());
            }
            requests
        });

        (url, handle)
    }

    #[tokio::test]
    async fn test_manual_retry_over_real_http() {
        let (url, server) = serve(vec![NOT_GRANTED_BODY, GRANTED_BODY]).await;

        let mut blueprint = UnlockBlueprint::default();
        blueprint.request.url = url;
        blueprint.retry.manual = contracts::RetryPolicy::ContinuousRetry;
        blueprint.retry.inter_attempt_delay_ms = 20;

        let shell = Arc::new(RecordingShell::new());
        let controller = ProcessController::new(
            blueprint,
            MockClock::new(0),
            MockProbe::new(Duration::ZERO),
            ReqwestTransport::new(Some(Duration::from_secs(5))).unwrap(),
            shell.clone(),
        )
        .unwrap();

        controller.start_mode(RunMode::Manual, "serviceToken=abc").unwrap();
        let report = controller.join(RunMode::Manual).await.unwrap();
        assert_eq!(report.result.unwrap(), FinalOutcome::Success { attempts: 2 });

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].ends_with(r#"{"is_retry":false}"#));
        assert!(requests[1].ends_with(r#"{"is_retry":true}"#));
        assert!(requests[1].to_ascii_lowercase().contains("cookie: servicetoken=abc"));
        assert!(shell.contains(RunMode::Manual, "permission not granted"));
    }
}
