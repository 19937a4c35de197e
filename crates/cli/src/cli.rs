//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use observability::{LogFormat, DEFAULT_METRICS_PORT};
use std::path::PathBuf;

/// Gyro Relay - live WebSocket broadcast and batched MySQL persistence of gyro samples
#[derive(Parser, Debug)]
#[command(
    name = "gyro-relay",
    author,
    version,
    about = "Gyro sample relay: WebSocket broadcast + batched persistence",
    long_about = "Accepts one newline-delimited JSON gyro stream (TCP or serial), \n\
                  broadcasts every sample to connected WebSocket subscribers and \n\
                  writes them to a timestamped MySQL table in fixed-size batches."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "GYRO_RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (json, pretty or compact)
    #[arg(
        long,
        default_value = "pretty",
        global = true,
        env = "GYRO_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay until Ctrl+C / SIGTERM or until the producer disconnects
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "gyro-relay.toml",
        env = "GYRO_RELAY_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the ingestion TCP listen address
    #[arg(long, env = "GYRO_RELAY_INGEST_BIND")]
    pub ingest_bind: Option<String>,

    /// Override the WebSocket listen address
    #[arg(long, env = "GYRO_RELAY_BROADCAST_BIND")]
    pub broadcast_bind: Option<String>,

    /// Override the MySQL connection URL
    #[arg(long, env = "GYRO_RELAY_DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Write into this table instead of a timestamped one
    #[arg(long, env = "GYRO_RELAY_TABLE")]
    pub table: Option<String>,

    /// Override the number of rows per insert
    #[arg(long, env = "GYRO_RELAY_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value_t = DEFAULT_METRICS_PORT, env = "GYRO_RELAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "gyro-relay.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "gyro-relay.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
