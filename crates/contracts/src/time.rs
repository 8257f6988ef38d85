//! Authoritative time, latency estimate and schedule window.

use std::time::Duration;

use tokio::time::Instant;

/// Timestamp obtained from a trusted external clock
///
/// `observed_at` is the local monotonic instant at which the reply was received,
/// so the authoritative clock can be advanced without consulting the wall clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoritativeTime {
    epoch_ms: i64,
    source: String,
    observed_at: Instant,
}

impl AuthoritativeTime {
    pub fn new(epoch_ms: i64, source: impl Into<String>, observed_at: Instant) -> Self {
        Self {
            epoch_ms,
            source: source.into(),
            observed_at,
        }
    }

    /// Unix epoch milliseconds reported by the source
    pub fn epoch_ms(&self) -> i64 {
        self.epoch_ms
    }

    /// Endpoint that supplied the time
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn observed_at(&self) -> Instant {
        self.observed_at
    }

    /// Authoritative "now", advanced by the monotonic time elapsed since observation
    pub fn now_epoch_ms(&self) -> i64 {
        let elapsed = self.observed_at.elapsed().as_millis();
        self.epoch_ms
            .saturating_add(i64::try_from(elapsed).unwrap_or(i64::MAX))
    }

    /// Local monotonic deadline corresponding to `target_epoch_ms`
    ///
    /// Targets at or before the authoritative time map to `observed_at`.
    pub fn local_deadline(&self, target_epoch_ms: i64) -> Instant {
        let ahead = target_epoch_ms.saturating_sub(self.epoch_ms).max(0);
        self.observed_at + Duration::from_millis(ahead.unsigned_abs())
    }
}

/// Expected network delay to the target host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyEstimate {
    millis: u64,
    samples: u32,
}

impl LatencyEstimate {
    /// Estimate averaged from `samples` successful probes
    pub fn measured(millis: u64, samples: u32) -> Self {
        Self { millis, samples }
    }

    /// Fixed default used when no probe succeeded
    pub fn fallback(default_ms: u64) -> Self {
        Self {
            millis: default_ms,
            samples: 0,
        }
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    /// Number of successful samples the estimate is based on
    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn is_fallback(&self) -> bool {
        self.samples == 0
    }
}

/// Arrival and send instants of one scheduling cycle (epoch ms)
///
/// Invariant: `send_epoch_ms = arrival_epoch_ms - latency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub arrival_epoch_ms: i64,
    pub send_epoch_ms: i64,
}

impl ScheduleWindow {
    /// Lead time subtracted from the arrival instant
    pub fn lead_ms(&self) -> i64 {
        self.arrival_epoch_ms - self.send_epoch_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_now_advances_with_monotonic_clock() {
        let time = AuthoritativeTime::new(1_000, "ntp.test", Instant::now());
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(time.now_epoch_ms(), 1_250);
    }

    #[test]
    fn test_local_deadline_offsets_from_observation() {
        let observed = Instant::now();
        let time = AuthoritativeTime::new(10_000, "ntp.test", observed);
        assert_eq!(
            time.local_deadline(12_500),
            observed + Duration::from_millis(2_500)
        );
        assert_eq!(time.local_deadline(9_000), observed);
    }

    #[test]
    fn test_latency_fallback_flag() {
        assert!(LatencyEstimate::fallback(180).is_fallback());
        assert!(!LatencyEstimate::measured(42, 3).is_fallback());
    }
}
