//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use contracts::{RetryPolicy, RunMode};

/// Unlock Scheduler - NTP-synced, latency-compensated unlock request sender
#[derive(Parser, Debug)]
#[command(
    name = "unlock-scheduler",
    author,
    version,
    about = "NTP-synced, latency-compensated unlock request scheduler",
    long_about = "Fires an unlock request so that it reaches the server at a precise\n\
                  wall-clock instant.\n\n\
                  Synchronizes with NTP, estimates network latency, sends early by that\n\
                  latency, classifies the JSON reply and optionally keeps retrying."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "UNLOCK_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "UNLOCK_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Tracing filter used when `RUST_LOG` is not set
    ///
    /// Shell lines are the primary output; tracing only shows up with `-v`.
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a run mode and wait for its outcome
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration and, optionally, a live schedule preview
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "UNLOCK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run mode
    #[arg(short, long, value_enum, default_value = "scheduled")]
    pub mode: ModeArg,

    /// Session cookie sent with the unlock request
    #[arg(long, env = "UNLOCK_COOKIE", hide_env_values = true)]
    pub cookie: Option<String>,

    /// Override the retry policy of the selected mode
    #[arg(long, value_enum)]
    pub retry: Option<RetryArg>,

    /// Override the target arrival time of day (`HH:MM:SS[.fff]`)
    #[arg(long)]
    pub at: Option<String>,

    /// Override the IANA time zone of the arrival time
    #[arg(long)]
    pub zone: Option<String>,

    /// Run the full timing cycle but answer the request locally instead of sending it
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "UNLOCK_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "unlock.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults when omitted
    #[arg(short, long, env = "UNLOCK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Sync time and probe latency to show the next arrival and send instants
    #[arg(long)]
    pub preview: bool,
}

/// Run mode argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// Wait for the computed send instant
    Scheduled,
    /// Send immediately
    Manual,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Scheduled => RunMode::Scheduled,
            ModeArg::Manual => RunMode::Manual,
        }
    }
}

/// Retry policy argument
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryArg {
    /// One attempt only
    Single,
    /// Retry until success, terminal failure or Ctrl+C
    Continuous,
}

impl From<RetryArg> for RetryPolicy {
    fn from(retry: RetryArg) -> Self {
        match retry {
            RetryArg::Single => RetryPolicy::SingleAttempt,
            RetryArg::Continuous => RetryPolicy::ContinuousRetry,
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "unlock-scheduler",
            "-v",
            "run",
            "--mode",
            "manual",
            "--cookie",
            "serviceToken=abc",
            "--retry",
            "continuous",
            "--at",
            "23:59:59.500",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.default_log_level(), "info");
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(RunMode::from(args.mode), RunMode::Manual);
        assert_eq!(args.cookie.as_deref(), Some("serviceToken=abc"));
        assert_eq!(args.retry.map(RetryPolicy::from), Some(RetryPolicy::ContinuousRetry));
        assert_eq!(args.at.as_deref(), Some("23:59:59.500"));
        assert!(args.dry_run);
        assert_eq!(args.metrics_port, 0);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["unlock-scheduler", "-q", "-v", "info"]).is_err());

        let cli = Cli::try_parse_from(["unlock-scheduler", "-q", "info", "--preview"]).unwrap();
        assert_eq!(cli.default_log_level(), "error");
        assert!(matches!(cli.command, Commands::Info(InfoArgs { preview: true, .. })));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(Cli::try_parse_from(["unlock-scheduler", "run", "--mode", "later"]).is_err());
    }
}
