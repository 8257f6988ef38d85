//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{RetryPolicy, UnlockBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    arrival: String,
    time_server_count: usize,
    latency_target: String,
    request_url: String,
    scheduled_policy: RetryPolicy,
    manual_policy: RetryPolicy,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match super::load_blueprint(Some(&args.config)) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(summarize(&blueprint)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn summarize(blueprint: &UnlockBlueprint) -> ConfigSummary {
    let schedule = &blueprint.schedule;
    ConfigSummary {
        version: format!("{:?}", blueprint.version),
        arrival: format!(
            "{} {} ({:?})",
            schedule.time_of_day, schedule.time_zone, schedule.rollover
        ),
        time_server_count: blueprint.time.servers.len(),
        latency_target: blueprint.latency.target(),
        request_url: blueprint.request.url.clone(),
        scheduled_policy: blueprint.retry.scheduled,
        manual_policy: blueprint.retry.manual,
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &UnlockBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.latency.samples == 0 {
        warnings.push(format!(
            "latency.samples is 0 - the default {} ms is always used",
            blueprint.latency.default_ms
        ));
    }

    let unbounded = blueprint.retry.attempt_cap().is_none();
    if unbounded && blueprint.retry.scheduled == RetryPolicy::ContinuousRetry {
        warnings.push(
            "retry.scheduled is continuous with no max_attempts - only a stop ends it".to_string(),
        );
    }

    if blueprint.request.timeout_ms.is_none() {
        warnings.push("request.timeout_ms is unset - a stalled request blocks the run".to_string());
    }

    if blueprint.wait.poll_interval_ms > 1000 {
        warnings.push(format!(
            "wait.poll_interval_ms is {} - stop requests may take that long to apply",
            blueprint.wait.poll_interval_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Arrival: {}", summary.arrival);
            println!("  Time servers: {}", summary.time_server_count);
            println!("  Latency target: {}", summary.latency_target);
            println!("  Request URL: {}", summary.request_url);
            println!(
                "  Retry: scheduled={:?}, manual={:?}",
                summary.scheduled_policy, summary.manual_policy
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_blueprint_warnings() {
        let warnings = collect_warnings(&UnlockBlueprint::default());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("request.timeout_ms"));
    }

    #[test]
    fn test_unbounded_scheduled_retry_warns() {
        let mut blueprint = UnlockBlueprint::default();
        blueprint.retry.scheduled = RetryPolicy::ContinuousRetry;
        blueprint.request.timeout_ms = Some(5000);

        let warnings = collect_warnings(&blueprint);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("retry.scheduled"));
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let result = validate_config(&ValidateArgs {
            config: "/nonexistent/unlock.toml".into(),
            json: true,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[test]
    fn test_summary_shape() {
        let summary = summarize(&UnlockBlueprint::default());
        assert_eq!(summary.arrival, "00:00:00 Asia/Shanghai (NextCalendarDay)");
        assert_eq!(summary.latency_target, "sgp-api.buy.mi.com:443");

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["scheduled_policy"], "single_attempt");
    }
}
