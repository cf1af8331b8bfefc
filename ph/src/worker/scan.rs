//! Range scan: classify every integer in a claimed range

use num_bigint::BigUint;
use tracing::debug;

use super::WorkerError;
use crate::engine::ResidueEngine;
use crate::transport::{RangeMessage, ScanResult};

/// Widest range a worker will accept in one claim
pub const MAX_SCAN_WIDTH: u64 = 1_000_000;

/// Check a claimed range before scanning it
pub fn validate_range(range: &RangeMessage) -> Result<(), WorkerError> {
    range.validate()?;
    if range.len() > MAX_SCAN_WIDTH {
        return Err(WorkerError::MalformedTask(format!(
            "range [{}, {}] holds {} integers, limit is {}",
            range.start,
            range.end,
            range.len(),
            MAX_SCAN_WIDTH
        )));
    }
    Ok(())
}

/// Classify `start..=end` with the routed primality test
///
/// A probable prime counts as prime on the wire; the batch format carries a
/// single flag.
pub fn scan_range(engine: &dyn ResidueEngine, range: RangeMessage) -> Vec<ScanResult> {
    debug!(start = range.start, end = range.end, "scan_range: called");
    (range.start..=range.end)
        .map(|n| {
            let value = BigUint::from(n);
            let is_prime = engine.classify(&value).is_prime();
            ScanResult { value, is_prime }
        })
        .collect()
}
