//! PrimeHack configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::worker::WorkMode;

/// Project-local config file name
pub const LOCAL_CONFIG: &str = ".primehack.yml";

/// Main worker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Task source connection
    pub source: SourceConfig,

    /// Worker loop behaviour
    pub worker: WorkerConfig,

    /// Local `check` runs
    pub check: CheckConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        debug!("validate: called");
        let url = &self.source.base_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(eyre::eyre!("source.base-url must start with http:// or https:// (got '{}')", url));
        }
        if self.source.timeout_ms == 0 {
            return Err(eyre::eyre!("source.timeout-ms must be greater than zero"));
        }
        if self.worker.history_capacity == 0 {
            return Err(eyre::eyre!("worker.history-capacity must be greater than zero"));
        }
        if self.check.chunk_size == 0 {
            return Err(eyre::eyre!("check.chunk-size must be greater than zero"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        debug!(?config_path, "load: called");
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .primehack.yml
        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/primehack/primehack.yml
        if let Some(user_config) = user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed; the full load reports them once logging is up.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("primehack").join("primehack.yml"))
}

/// Task source connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL of the task source
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Per-request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Worker loop behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Work mode: `ll` (Lucas-Lehmer chunks) or `scan` (range scan)
    pub mode: WorkMode,

    /// Pause between iterations in milliseconds
    #[serde(rename = "pause-ms")]
    pub pause_ms: u64,

    /// Pause after the source reports no work, in milliseconds
    #[serde(rename = "idle-pause-ms")]
    pub idle_pause_ms: u64,

    /// Stop after this many submitted chunks (unbounded when absent)
    #[serde(rename = "max-chunks")]
    pub max_chunks: Option<u64>,

    /// Number of recent results kept in the session history
    #[serde(rename = "history-capacity")]
    pub history_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            mode: WorkMode::LucasLehmer,
            pause_ms: 100,
            idle_pause_ms: 5_000,
            max_chunks: None,
            history_capacity: crate::worker::DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Local `check` runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Iterations per chunk when testing an exponent locally
    #[serde(rename = "chunk-size")]
    pub chunk_size: u64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self { chunk_size: 10_000 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.source.base_url, "http://localhost:3000");
        assert_eq!(config.worker.history_capacity, 100);
        assert_eq!(config.worker.mode, WorkMode::LucasLehmer);
        assert!(config.worker.max_chunks.is_none());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
log-level: debug
source:
  base-url: http://tasks.example:8080
  timeout-ms: 1500
worker:
  mode: scan
  max-chunks: 3
check:
  chunk-size: 64
"#
        )
        .unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.source.base_url, "http://tasks.example:8080");
        assert_eq!(config.source.timeout_ms, 1500);
        assert_eq!(config.worker.mode, WorkMode::RangeScan);
        assert_eq!(config.worker.max_chunks, Some(3));
        // Unspecified fields keep their defaults
        assert_eq!(config.worker.pause_ms, 100);
        assert_eq!(config.check.chunk_size, 64);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let path = PathBuf::from("/nonexistent/primehack.yml");
        assert!(Config::load(Some(&path)).is_err());
        assert_eq!(Config::load_log_level(Some(&path)), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.source.base_url = "localhost:3000".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.check.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.worker.history_capacity = 0;
        assert!(config.validate().is_err());
    }
}
