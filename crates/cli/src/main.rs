//! # Unlock Scheduler CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - scheduled / manual 模式的启动与 Ctrl+C 停止
//! - 授时与发送时刻预览

mod cli;
mod commands;
mod error;
mod shell;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_unlock, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: cli.default_log_level().to_string(),
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Unlock Scheduler CLI starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_unlock(args, cli.quiet).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args, cli.quiet).await,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}
