//! `run` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{HttpTransport, RunMode, ShellEvents, UnlockBlueprint};
use controller::mock::MockHttp;
use controller::{ProcessController, RunReport, StartOutcome};
use dispatcher::ReqwestTransport;
use time_sync::{SntpTransport, TcpReachability};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::shell::ConsoleShell;

/// Execute the `run` command
pub async fn run_unlock(args: &RunArgs, quiet: bool) -> Result<()> {
    let mut blueprint = super::load_blueprint(args.config.as_deref())?;
    let mode = RunMode::from(args.mode);
    apply_overrides(&mut blueprint, args, mode);
    ConfigLoader::validate(&blueprint).context("Invalid configuration after CLI overrides")?;

    let cookie = args
        .cookie
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or(CliError::MissingCookie)?;

    info!(
        %mode,
        time_of_day = %blueprint.schedule.time_of_day,
        time_zone = %blueprint.schedule.time_zone,
        policy = ?blueprint.retry.policy_for(mode),
        dry_run = args.dry_run,
        "Configuration loaded"
    );

    // Initialize Metrics (optional)
    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let shell: Arc<dyn ShellEvents> = Arc::new(ConsoleShell::new(quiet));
    let report = if args.dry_run {
        warn!("Dry run: the unlock request is answered locally and never sent");
        let controller = ProcessController::new(
            blueprint,
            SntpTransport,
            TcpReachability,
            MockHttp::granting(),
            shell,
        )?;
        drive(&controller, mode, cookie).await?
    } else {
        let http = ReqwestTransport::new(blueprint.request.timeout())?;
        let controller =
            ProcessController::new(blueprint, SntpTransport, TcpReachability, http, shell)?;
        drive(&controller, mode, cookie).await?
    };

    info!(
        outcome = report.label(),
        attempts = report.attempts(),
        elapsed_secs = report.elapsed.as_secs_f64(),
        "Run finished"
    );
    if !quiet {
        println!("\n{report}");
    }

    if report.is_success() || matches!(report.result, Ok(contracts::FinalOutcome::Cancelled { .. })) {
        Ok(())
    } else {
        Err(CliError::run_failed(&report).into())
    }
}

fn apply_overrides(blueprint: &mut UnlockBlueprint, args: &RunArgs, mode: RunMode) {
    if let Some(retry) = args.retry {
        info!(%mode, policy = ?retry, "Overriding retry policy from CLI");
        match mode {
            RunMode::Scheduled => blueprint.retry.scheduled = retry.into(),
            RunMode::Manual => blueprint.retry.manual = retry.into(),
        }
    }
    if let Some(ref at) = args.at {
        info!(time_of_day = %at, "Overriding arrival time from CLI");
        blueprint.schedule.time_of_day = at.clone();
    }
    if let Some(ref zone) = args.zone {
        info!(time_zone = %zone, "Overriding time zone from CLI");
        blueprint.schedule.time_zone = zone.clone();
    }
}

/// Start `mode`, then wait for its worker or for Ctrl+C / SIGTERM
async fn drive<H>(
    controller: &ProcessController<SntpTransport, TcpReachability, H>,
    mode: RunMode,
    cookie: &str,
) -> Result<RunReport>
where
    H: HttpTransport + Sync + 'static,
{
    if controller.start_mode(mode, cookie)? == StartOutcome::AlreadyRunning {
        warn!(%mode, "Mode already running");
    }

    // the join future owns the worker handle once polled; keep it across the signal
    let join = controller.join(mode);
    tokio::pin!(join);

    tokio::select! {
        report = &mut join => {
            return report.context("Worker was not started");
        }
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping...");
            controller.stop_mode(mode);
        }
    }

    join.await.context("Worker was not started")
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{ModeArg, RetryArg};
    use contracts::RetryPolicy;

    fn args() -> RunArgs {
        RunArgs {
            config: None,
            mode: ModeArg::Manual,
            cookie: Some("c".into()),
            retry: Some(RetryArg::Continuous),
            at: Some("12:30:00".into()),
            zone: Some("Asia/Kolkata".into()),
            dry_run: true,
            metrics_port: 0,
        }
    }

    #[test]
    fn test_overrides_touch_only_selected_mode() {
        let mut blueprint = UnlockBlueprint::default();
        apply_overrides(&mut blueprint, &args(), RunMode::Manual);

        assert_eq!(blueprint.retry.manual, RetryPolicy::ContinuousRetry);
        assert_eq!(blueprint.retry.scheduled, RetryPolicy::SingleAttempt);
        assert_eq!(blueprint.schedule.time_of_day, "12:30:00");
        assert_eq!(blueprint.schedule.time_zone, "Asia/Kolkata");
    }

    #[tokio::test]
    async fn test_blank_cookie_is_rejected_before_start() {
        let mut args = args();
        args.cookie = Some("   ".into());

        let err = run_unlock(&args, true).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::MissingCookie)
        ));
    }

    #[tokio::test]
    async fn test_manual_dry_run_succeeds_without_network() {
        let args = RunArgs {
            retry: None,
            ..args()
        };
        run_unlock(&args, true).await.unwrap();
    }
}
