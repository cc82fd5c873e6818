//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CARLA Collect - command-segmented driving data collection
#[derive(Parser, Debug)]
#[command(
    name = "carla-collect",
    author,
    version,
    about = "Command-segmented driving data collection for CARLA",
    long_about = "Drives an ego vehicle along a planned route, asks the operator which \n\
                  navigation-command segments to keep, and writes approved segments \n\
                  as compressed chunk files for imitation-learning training."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CARLA_COLLECT_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "CARLA_COLLECT_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive collection along one route
    Collect(CollectArgs),

    /// Unattended collection over generated routes
    Auto(AutoArgs),

    /// Verify collected chunk files
    Verify(VerifyArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Options shared by `collect` and `auto`
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Path to configuration file (TOML or JSON); defaults are used when absent
    #[arg(short, long, env = "CARLA_COLLECT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override simulator host
    #[arg(long, env = "CARLA_HOST")]
    pub host: Option<String>,

    /// Override simulator port
    #[arg(long, env = "CARLA_PORT")]
    pub port: Option<u16>,

    /// Override map name
    #[arg(long, env = "CARLA_MAP")]
    pub map: Option<String>,

    /// Override frame budget
    #[arg(long, env = "CARLA_COLLECT_MAX_FRAMES")]
    pub max_frames: Option<u64>,

    /// Override output directory
    #[arg(long, env = "CARLA_COLLECT_SAVE_PATH")]
    pub save_path: Option<PathBuf>,

    /// Pace ticks at `fixed_delta_seconds` of wall-clock time
    #[arg(long)]
    pub realtime: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "CARLA_COLLECT_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `collect` command
#[derive(Parser, Debug, Clone)]
pub struct CollectArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Override start spawn point index
    #[arg(long, alias = "start")]
    pub spawn_index: Option<usize>,

    /// Override destination spawn point index
    #[arg(long, alias = "end")]
    pub destination_index: Option<usize>,

    /// Approve every segment without prompting
    #[arg(long)]
    pub auto_approve: bool,
}

/// Arguments for the `auto` command
#[derive(Parser, Debug, Clone)]
pub struct AutoArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Override route pair strategy
    #[arg(long, value_enum)]
    pub strategy: Option<Strategy>,

    /// Override frames collected per route
    #[arg(long)]
    pub frames_per_route: Option<u64>,

    /// Stop after this many routes
    #[arg(long)]
    pub max_routes: Option<usize>,
}

/// Arguments for the `verify` command
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Directory containing chunk files
    #[arg(default_value = "./carla_data")]
    pub data_path: PathBuf,

    /// Files with fewer samples are reported as incomplete
    #[arg(long, default_value = "200")]
    pub chunk_size: usize,

    /// Write verification_report.json into the data directory
    #[arg(long)]
    pub save_report: bool,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "collector.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "collector.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the command mapping table
    #[arg(long)]
    pub commands: bool,
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

/// Route pair strategy
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Strategy {
    Smart,
    Exhaustive,
}

impl From<Strategy> for contracts::RouteStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Smart => contracts::RouteStrategy::Smart,
            Strategy::Exhaustive => contracts::RouteStrategy::Exhaustive,
        }
    }
}
