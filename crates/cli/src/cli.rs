//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Record Syncer - validate customer records and deliver them to a collector
#[derive(Parser, Debug)]
#[command(
    name = "record-syncer",
    author,
    version,
    about = "Validate customer records and deliver them to a remote collector",
    long_about = "Normalizes and validates customer records from a JSON export, then \n\
                  delivers the accepted ones to a collection endpoint with retries, \n\
                  rate limiting and batch fallback."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "RECORD_SYNCER_VERBOSE")]
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
        env = "RECORD_SYNCER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Filter used when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the input and deliver accepted records
    Run(RunArgs),

    /// Validate an input file without delivering anything
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),

    /// Send a connection test to the configured endpoint
    Probe(ProbeArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "syncer.toml", env = "RECORD_SYNCER_CONFIG")]
    pub config: PathBuf,

    /// Path to the records file (JSON array or {"customers": [...]})
    #[arg(short, long, env = "RECORD_SYNCER_INPUT")]
    pub input: PathBuf,

    /// Override the endpoint URL from configuration
    #[arg(long, env = "RECORD_SYNCER_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,

    /// Override the retry count from configuration
    #[arg(long, env = "RECORD_SYNCER_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Deliver to a log-only endpoint instead of the configured one
    #[arg(long)]
    pub dry_run: bool,

    /// Cancel the run after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "RECORD_SYNCER_TIMEOUT")]
    pub timeout: u64,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "RECORD_SYNCER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Print the delivery report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to the records file
    #[arg(short, long, env = "RECORD_SYNCER_INPUT")]
    pub input: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "syncer.toml", env = "RECORD_SYNCER_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `probe` command
#[derive(Parser, Debug)]
pub struct ProbeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "syncer.toml", env = "RECORD_SYNCER_CONFIG")]
    pub config: PathBuf,

    /// Override the endpoint URL from configuration
    #[arg(long, env = "RECORD_SYNCER_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,
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
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
