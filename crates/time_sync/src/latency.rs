//! LatencyProbe - averaged round-trip probes used as send-time compensation
//!
//! The round-trip duration of a connectivity check stands in for the one-way
//! transit delay. This is a known approximation and is not halved.

use std::time::Duration;

use contracts::{CancellationFlag, LatencyEstimate, ModeLog, ReachabilityProbe};
use tokio::time::Instant;
use tracing::instrument;

/// Latency estimator over an injected reachability probe
#[derive(Debug)]
pub struct LatencyProbe<P: ReachabilityProbe> {
    probe: P,
    default_ms: u64,
}

impl<P: ReachabilityProbe> LatencyProbe<P> {
    /// `default_ms` is returned when no sample succeeds
    pub fn new(probe: P, default_ms: u64) -> Self {
        Self { probe, default_ms }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Run up to `sample_count` sequential probes against `host`
    ///
    /// Failed or timed-out probes are skipped. Cancellation is checked before
    /// each sample. Returns `floor(sum / k)` over the `k` successful samples,
    /// or the default when `k == 0`.
    #[instrument(
        name = "latency_probe_estimate",
        skip(self, cancel, log),
        fields(mode = %log.mode())
    )]
    pub async fn estimate_latency(
        &self,
        host: &str,
        sample_count: u32,
        timeout_per_sample: Duration,
        cancel: &CancellationFlag,
        log: &ModeLog,
    ) -> LatencyEstimate {
        log.info(format!("Pinging {host} {sample_count} times..."));

        let mut total_ms: u64 = 0;
        let mut successes: u32 = 0;

        for i in 1..=sample_count {
            if cancel.is_cancelled() {
                break;
            }

            let start = Instant::now();
            let reachable = matches!(
                tokio::time::timeout(
                    timeout_per_sample,
                    self.probe.is_reachable(host, timeout_per_sample)
                )
                .await,
                Ok(true)
            );
            let duration_ms = start.elapsed().as_millis() as u64;

            if reachable {
                log.info(format!("Ping {i}: {duration_ms} ms"));
                total_ms += duration_ms;
                successes += 1;
            } else {
                log.warn(format!("Ping {i}: Failed (unreachable after {duration_ms} ms)"));
            }
        }

        let estimate = if successes > 0 {
            let avg = total_ms / u64::from(successes);
            log.info(format!("Average Ping: {avg} ms"));
            LatencyEstimate::measured(avg, successes)
        } else {
            log.warn(format!(
                "All pings failed. Using default latency: {} ms",
                self.default_ms
            ));
            LatencyEstimate::fallback(self.default_ms)
        };

        observability::record_latency_estimate(estimate.as_millis(), estimate.is_fallback());
        estimate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::RunMode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Probe that sleeps a scripted duration and answers a scripted result
    struct ScriptedProbe {
        script: Mutex<Vec<(u64, bool)>>,
        calls: AtomicUsize,
        cancel_after_first: Option<CancellationFlag>,
    }

    impl ScriptedProbe {
        fn new(script: &[(u64, bool)]) -> Self {
            let mut script = script.to_vec();
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
                cancel_after_first: None,
            }
        }
    }

    impl ReachabilityProbe for ScriptedProbe {
        async fn is_reachable(&self, _host: &str, _timeout: Duration) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop();
            if let Some(flag) = &self.cancel_after_first {
                flag.cancel();
            }
            match next {
                Some((delay_ms, reachable)) => {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    reachable
                }
                None => false,
            }
        }
    }

    fn log() -> ModeLog {
        ModeLog::detached(RunMode::Scheduled)
    }

    #[tokio::test(start_paused = true)]
    async fn test_average_of_successful_samples_rounds_down() {
        let probe = LatencyProbe::new(
            ScriptedProbe::new(&[(100, true), (51, true), (70, false)]),
            180,
        );
        let estimate = probe
            .estimate_latency(
                "host:443",
                3,
                Duration::from_secs(2),
                &CancellationFlag::new(),
                &log(),
            )
            .await;

        // (100 + 51) / 2 = 75.5 -> 75
        assert_eq!(estimate, LatencyEstimate::measured(75, 2));
        assert_eq!(probe.probe().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failures_fall_back_to_default() {
        let probe = LatencyProbe::new(
            ScriptedProbe::new(&[(10, false), (10, false), (10, false)]),
            180,
        );
        let estimate = probe
            .estimate_latency(
                "host:443",
                3,
                Duration::from_secs(2),
                &CancellationFlag::new(),
                &log(),
            )
            .await;

        assert_eq!(estimate.as_millis(), 180);
        assert!(estimate.is_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_samples_is_default() {
        let probe = LatencyProbe::new(ScriptedProbe::new(&[]), 180);
        let estimate = probe
            .estimate_latency(
                "host:443",
                0,
                Duration::from_secs(2),
                &CancellationFlag::new(),
                &log(),
            )
            .await;
        assert_eq!(estimate, LatencyEstimate::fallback(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_exceeding_timeout_does_not_count() {
        let probe = LatencyProbe::new(ScriptedProbe::new(&[(5_000, true), (40, true)]), 180);
        let estimate = probe
            .estimate_latency(
                "host:443",
                2,
                Duration::from_secs(2),
                &CancellationFlag::new(),
                &log(),
            )
            .await;
        assert_eq!(estimate, LatencyEstimate::measured(40, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_between_samples() {
        let cancel = CancellationFlag::new();
        let mut scripted = ScriptedProbe::new(&[(30, true), (30, true), (30, true)]);
        scripted.cancel_after_first = Some(cancel.clone());
        let probe = LatencyProbe::new(scripted, 180);

        let estimate = probe
            .estimate_latency("host:443", 3, Duration::from_secs(2), &cancel, &log())
            .await;

        assert_eq!(probe.probe().calls.load(Ordering::SeqCst), 1);
        assert_eq!(estimate, LatencyEstimate::measured(30, 1));
    }
}
