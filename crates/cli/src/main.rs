//! # CARLA Collect CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 单路线交互式采集 (`collect`)
//! - 全图自动采集 (`auto`)
//! - 数据验证与配置检查 (`verify` / `validate` / `info`)

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use observability::TracingConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_auto, run_collect, run_info, run_validate, run_verify};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "CARLA Collect CLI starting"
    );

    let result = match &cli.command {
        Commands::Collect(args) => run_collect(args).await,
        Commands::Auto(args) => run_auto(args).await,
        Commands::Verify(args) => run_verify(args),
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    let (level, force_level) = if cli.quiet {
        ("warn", true)
    } else {
        let level = match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        (level, false)
    };

    observability::init_tracing(&TracingConfig {
        log_format: cli.log_format.into(),
        default_log_level: level.to_string(),
        force_level,
    })
}
