//! `info` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::{
    AuthoritativeTime, CancellationFlag, LatencyEstimate, ModeLog, RunMode, ScheduleRule,
    UnlockBlueprint,
};
use serde::Serialize;
use time_sync::{
    compute_schedule_at, format_in_zone, LatencyProbe, SntpTransport, TcpReachability, TimeSource,
};
use tracing::info;

use crate::cli::InfoArgs;
use crate::shell::ConsoleShell;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    time_servers: Vec<String>,
    schedule: ScheduleInfo,
    latency: LatencyInfo,
    request: RequestInfo,
    retry: RetryInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    preview: Option<PreviewInfo>,
}

#[derive(Serialize)]
struct ScheduleInfo {
    time_of_day: String,
    time_zone: String,
    rollover: String,
}

#[derive(Serialize)]
struct LatencyInfo {
    target: String,
    samples: u32,
    default_ms: u64,
}

#[derive(Serialize)]
struct RequestInfo {
    url: String,
    user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
}

#[derive(Serialize)]
struct RetryInfo {
    scheduled: String,
    manual: String,
    inter_attempt_delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_attempts: Option<u32>,
}

/// Live schedule computed from a fresh sync
#[derive(Serialize)]
struct PreviewInfo {
    time_source: String,
    authoritative_time: String,
    latency_ms: u64,
    latency_fallback: bool,
    arrival: String,
    send: String,
    send_in_ms: i64,
}

/// Execute the `info` command
pub async fn run_info(args: &InfoArgs, quiet: bool) -> Result<()> {
    let blueprint = super::load_blueprint(args.config.as_deref())?;

    let preview = if args.preview {
        // sync lines go to the shell only for human output
        Some(preview_schedule(&blueprint, quiet || args.json).await?)
    } else {
        None
    };

    let info = build_config_info(&blueprint, preview);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

async fn preview_schedule(blueprint: &UnlockBlueprint, quiet: bool) -> Result<PreviewInfo> {
    let rule = blueprint.schedule.to_rule()?;
    let log = ModeLog::new(RunMode::Scheduled, Arc::new(ConsoleShell::new(quiet)));

    let source = TimeSource::new(SntpTransport, blueprint.time.query_timeout());
    let now = source
        .fetch_authoritative_time(&blueprint.time.servers, &log)
        .await
        .context("Time synchronization failed")?;

    let latency_cfg = &blueprint.latency;
    let latency = LatencyProbe::new(TcpReachability, latency_cfg.default_ms)
        .estimate_latency(
            &latency_cfg.target(),
            latency_cfg.samples,
            latency_cfg.timeout(),
            &CancellationFlag::new(),
            &log,
        )
        .await;

    preview_from(&now, latency, &rule)
}

/// Schedule against the clock advanced past the probes, as a real run does
fn preview_from(
    now: &AuthoritativeTime,
    latency: LatencyEstimate,
    rule: &ScheduleRule,
) -> Result<PreviewInfo> {
    let now_ms = now.now_epoch_ms();
    let window = compute_schedule_at(now_ms, latency, rule)?;
    info!(
        arrival_epoch_ms = window.arrival_epoch_ms,
        send_epoch_ms = window.send_epoch_ms,
        "Schedule preview computed"
    );

    Ok(PreviewInfo {
        time_source: now.source().to_string(),
        authoritative_time: format_in_zone(now_ms, rule.zone),
        latency_ms: latency.as_millis(),
        latency_fallback: latency.is_fallback(),
        arrival: format_in_zone(window.arrival_epoch_ms, rule.zone),
        send: format_in_zone(window.send_epoch_ms, rule.zone),
        send_in_ms: window.send_epoch_ms - now_ms,
    })
}

fn build_config_info(blueprint: &UnlockBlueprint, preview: Option<PreviewInfo>) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        time_servers: blueprint.time.servers.clone(),
        schedule: ScheduleInfo {
            time_of_day: blueprint.schedule.time_of_day.clone(),
            time_zone: blueprint.schedule.time_zone.clone(),
            rollover: format!("{:?}", blueprint.schedule.rollover),
        },
        latency: LatencyInfo {
            target: blueprint.latency.target(),
            samples: blueprint.latency.samples,
            default_ms: blueprint.latency.default_ms,
        },
        request: RequestInfo {
            url: blueprint.request.url.clone(),
            user_agent: blueprint.request.user_agent.clone(),
            timeout_ms: blueprint.request.timeout_ms,
        },
        retry: RetryInfo {
            scheduled: format!("{:?}", blueprint.retry.scheduled),
            manual: format!("{:?}", blueprint.retry.manual),
            inter_attempt_delay_ms: blueprint.retry.inter_attempt_delay_ms,
            max_attempts: blueprint.retry.attempt_cap(),
        },
        preview,
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Unlock Scheduler Configuration                 ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🕛 Schedule");
    println!("   ├─ Version: {}", info.version);
    println!(
        "   ├─ Arrival: {} {}",
        info.schedule.time_of_day, info.schedule.time_zone
    );
    println!("   └─ Rollover: {}", info.schedule.rollover);

    println!("\n🌐 Time Servers ({})", info.time_servers.len());
    for (i, server) in info.time_servers.iter().enumerate() {
        let prefix = if i == info.time_servers.len() - 1 { "└─" } else { "├─" };
        println!("   {} {}", prefix, server);
    }

    println!("\n📶 Latency");
    println!("   ├─ Target: {}", info.latency.target);
    println!("   ├─ Samples: {}", info.latency.samples);
    println!("   └─ Default: {} ms", info.latency.default_ms);

    println!("\n📤 Request");
    println!("   ├─ URL: {}", info.request.url);
    println!("   ├─ User-Agent: {}", info.request.user_agent);
    match info.request.timeout_ms {
        Some(ms) => println!("   └─ Timeout: {} ms", ms),
        None => println!("   └─ Timeout: (transport default)"),
    }

    println!("\n🔁 Retry");
    println!("   ├─ Scheduled: {}", info.retry.scheduled);
    println!("   ├─ Manual: {}", info.retry.manual);
    println!("   ├─ Delay: {} ms", info.retry.inter_attempt_delay_ms);
    match info.retry.max_attempts {
        Some(max) => println!("   └─ Max attempts: {}", max),
        None => println!("   └─ Max attempts: unlimited"),
    }

    if let Some(ref preview) = info.preview {
        println!("\n⏱  Preview");
        println!("   ├─ Source: {}", preview.time_source);
        println!("   ├─ Now: {}", preview.authoritative_time);
        let fallback = if preview.latency_fallback { " (default)" } else { "" };
        println!("   ├─ Latency: {} ms{}", preview.latency_ms, fallback);
        println!("   ├─ Arrival: {}", preview.arrival);
        println!("   ├─ Send: {}", preview.send);
        println!("   └─ Send in: {:.3} s", preview.send_in_ms as f64 / 1000.0);
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_info_json_omits_absent_parts() {
        let info = build_config_info(&UnlockBlueprint::default(), None);
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["schedule"]["time_zone"], "Asia/Shanghai");
        assert_eq!(json["retry"]["inter_attempt_delay_ms"], 250);
        assert!(json.get("preview").is_none());
        assert!(json["retry"].get("max_attempts").is_none());
        assert!(json["request"].get("timeout_ms").is_none());
    }

    /// 2024-05-01 23:59:59.600 +08:00
    const JUST_BEFORE_MIDNIGHT: i64 = 1_714_579_199_600;

    fn midnight_rule() -> ScheduleRule {
        UnlockBlueprint::default().schedule.to_rule().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_uses_advanced_clock() {
        let now = AuthoritativeTime::new(JUST_BEFORE_MIDNIGHT, "ntp-a", tokio::time::Instant::now());
        tokio::time::advance(std::time::Duration::from_millis(100)).await;

        let preview = preview_from(&now, LatencyEstimate::measured(100, 3), &midnight_rule()).unwrap();
        assert_eq!(preview.authoritative_time, "2024-05-01 23:59:59.700 CST");
        assert_eq!(preview.arrival, "2024-05-02 00:00:00.000 CST");
        assert_eq!(preview.send_in_ms, 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_past_deadline_after_probing() {
        let now = AuthoritativeTime::new(JUST_BEFORE_MIDNIGHT, "ntp-a", tokio::time::Instant::now());
        // send instant 23:59:59.900 is still ahead of the raw sync time
        tokio::time::advance(std::time::Duration::from_millis(300)).await;

        let result = preview_from(&now, LatencyEstimate::measured(100, 3), &midnight_rule());
        let err = result.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<time_sync::TimeSyncError>(),
            Some(time_sync::TimeSyncError::PastDeadline { .. })
        ));
    }
}
