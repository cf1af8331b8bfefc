//! CLI definition for the task source

use clap::Parser;
use std::path::PathBuf;

/// TaskSource - hands out Lucas-Lehmer work to PrimeHack workers
#[derive(Debug, Parser)]
#[command(
    name = "ts",
    about = "Reference task source for distributed Lucas-Lehmer workers",
    version = env!("GIT_DESCRIBE")
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Address to listen on (overrides config)
    #[arg(long)]
    pub listen: Option<String>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
}
