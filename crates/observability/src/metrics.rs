//! Unlock scheduler 指标收集模块
//!
//! 所有指标通过 `metrics` facade 记录；未安装 recorder 时为 no-op。

use metrics::{counter, gauge, histogram};

/// 记录一次授时查询
pub fn record_time_sync(server: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "unlock_time_sync_total",
        "server" => server.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 记录延迟估算结果
///
/// `fallback = true` 表示所有探测失败、使用了默认值。
pub fn record_latency_estimate(latency_ms: u64, fallback: bool) {
    gauge!("unlock_latency_estimate_ms").set(latency_ms as f64);
    if fallback {
        counter!("unlock_latency_fallback_total").increment(1);
    }
}

/// 记录一次解锁请求
///
/// `outcome` 为分类标签 (如 `success`, `not_granted`, `transport`)。
pub fn record_attempt(outcome: &'static str, duration_ms: u64, status: Option<u16>) {
    counter!("unlock_attempts_total", "outcome" => outcome).increment(1);
    histogram!("unlock_attempt_duration_ms").record(duration_ms as f64);

    if let Some(status) = status {
        gauge!("unlock_last_http_status").set(f64::from(status));
    }
}

/// 记录一次运行的最终结果
pub fn record_run_outcome(mode: &'static str, outcome: &'static str) {
    counter!(
        "unlock_runs_total",
        "mode" => mode,
        "outcome" => outcome
    )
    .increment(1);
}

/// 记录计算出的提前量 (到达时刻 - 发送时刻)
pub fn record_schedule_lead_ms(lead_ms: i64) {
    gauge!("unlock_schedule_lead_ms").set(lead_ms as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_time_sync("pool.ntp.org", true);
        record_time_sync("time.google.com", false);
        record_latency_estimate(180, true);
        record_attempt("success", 42, Some(200));
        record_attempt("transport", 2_000, None);
        record_run_outcome("scheduled", "success");
        record_schedule_lead_ms(120);
    }
}
