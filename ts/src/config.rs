//! Task source configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Project-local config file name
pub const LOCAL_CONFIG: &str = ".tasksource.yml";

/// Main task source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Address the HTTP server binds to
    pub listen: String,

    /// Work allocation
    pub ledger: LedgerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: None,
            listen: "127.0.0.1:3000".to_string(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        debug!("validate: called");
        if self.ledger.chunk_size == 0 {
            return Err(eyre::eyre!("ledger.chunk-size must be greater than zero"));
        }
        if self.ledger.max_active == 0 {
            return Err(eyre::eyre!("ledger.max-active must be greater than zero"));
        }
        if self.ledger.range_width == 0 {
            return Err(eyre::eyre!("ledger.range-width must be greater than zero"));
        }
        if self.ledger.lease_timeout_secs == 0 {
            return Err(eyre::eyre!("ledger.lease-timeout-secs must be greater than zero"));
        }
        if let Some(last) = self.ledger.last_exponent
            && last < self.ledger.first_exponent
        {
            return Err(eyre::eyre!(
                "ledger.last-exponent ({}) is below ledger.first-exponent ({})",
                last,
                self.ledger.first_exponent
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        debug!(?config_path, "load: called");
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .tasksource.yml
        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tasksource/tasksource.yml
        if let Some(user_config) = dirs::config_dir().map(|d| d.join("tasksource").join("tasksource.yml"))
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// How work is carved up and handed out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Iterations per Lucas-Lehmer chunk
    #[serde(rename = "chunk-size")]
    pub chunk_size: u64,

    /// Seconds before an unanswered chunk is handed out again
    #[serde(rename = "lease-timeout-secs")]
    pub lease_timeout_secs: u64,

    /// Smallest exponent to test
    #[serde(rename = "first-exponent")]
    pub first_exponent: u64,

    /// Largest exponent to test (unbounded when absent)
    #[serde(rename = "last-exponent")]
    pub last_exponent: Option<u64>,

    /// Exponents with work outstanding at any one time
    #[serde(rename = "max-active")]
    pub max_active: usize,

    /// First integer handed out for range scans
    #[serde(rename = "range-start")]
    pub range_start: u64,

    /// Integers per range-scan claim
    #[serde(rename = "range-width")]
    pub range_width: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            lease_timeout_secs: 300,
            first_exponent: 2,
            last_exponent: None,
            max_active: 4,
            range_start: 1_000_000,
            range_width: 101,
        }
    }
}
