//! Worker loop
//!
//! A worker repeatedly claims a unit of work from the task source, computes
//! it locally and reports the result:
//!
//! ```text
//! Idle ──run──▶ Running ──stop──▶ Idle
//!                  │
//!                  └──ComputationFault──▶ Faulted
//! ```
//!
//! Network trouble, stale chunks and malformed tasks abandon the current
//! iteration only. A kernel fault stops the worker; a wrong residue must never
//! be submitted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod error;
mod runner;
mod scan;
mod session;

pub use error::WorkerError;
pub use runner::{IterationResult, WorkerHandle, WorkerLoop, WorkerState};
pub use scan::{MAX_SCAN_WIDTH, scan_range, validate_range};
pub use session::{DEFAULT_HISTORY_CAPACITY, HistoryEntry, WorkerSession};

/// What kind of work a worker claims
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkMode {
    /// Lucas-Lehmer chunks of a Mersenne exponent
    #[default]
    #[serde(rename = "ll")]
    LucasLehmer,
    /// Primality of every integer in a claimed range
    #[serde(rename = "scan")]
    RangeScan,
}

impl fmt::Display for WorkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkMode::LucasLehmer => write!(f, "ll"),
            WorkMode::RangeScan => write!(f, "scan"),
        }
    }
}

impl FromStr for WorkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ll" | "lucas-lehmer" => Ok(WorkMode::LucasLehmer),
            "scan" | "range-scan" => Ok(WorkMode::RangeScan),
            _ => Err(format!("Unknown work mode: {}. Valid modes: ll, scan", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_mode_parse_and_display() {
        assert_eq!("ll".parse::<WorkMode>().unwrap(), WorkMode::LucasLehmer);
        assert_eq!("Range-Scan".parse::<WorkMode>().unwrap(), WorkMode::RangeScan);
        assert!("gpu".parse::<WorkMode>().is_err());
        assert_eq!(WorkMode::RangeScan.to_string(), "scan");
        assert_eq!(serde_yaml::to_string(&WorkMode::LucasLehmer).unwrap().trim(), "ll");
    }
}
