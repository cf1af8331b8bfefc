//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::worker::WorkMode;

/// PrimeHack - distributed Lucas-Lehmer worker
#[derive(Parser)]
#[command(
    name = "ph",
    about = "Distributed Lucas-Lehmer worker for the Mersenne prime search",
    version = env!("GIT_DESCRIBE"),
    after_help = after_help()
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Claim and compute work from a task source until stopped
    Run {
        /// Work mode (ll, scan)
        #[arg(short, long)]
        mode: Option<WorkMode>,

        /// Stop after this many submitted chunks
        #[arg(short = 'n', long)]
        max_chunks: Option<u64>,

        /// Task source base URL (overrides config)
        #[arg(short, long)]
        source: Option<String>,

        /// Output format for progress lines
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Run a complete Lucas-Lehmer test locally, chunk by chunk
    Check {
        /// Exponent p of 2^p - 1
        p: u64,

        /// Iterations per chunk (overrides config)
        #[arg(long)]
        chunk_size: Option<u64>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Test a decimal integer for primality
    Prime {
        /// Decimal integer
        n: String,
    },

    /// Print 2^p - 1
    Mersenne {
        /// Exponent p
        p: u64,

        /// Print only the number of decimal digits
        #[arg(short, long)]
        digits: bool,
    },

    /// List primes recorded by the task source
    Primes {
        /// Task source base URL (overrides config)
        #[arg(short, long)]
        source: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("primehack")
        .join("logs")
        .join("primehack.log")
}

fn after_help() -> String {
    format!("Logs are written to: {}", get_log_path().display())
}

/// Output format for commands that print results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Valid formats: text, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
