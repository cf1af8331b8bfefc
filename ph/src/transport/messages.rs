//! Wire messages shared by workers and the task source
//!
//! Residues and candidate numerals are always decimal strings. Iteration
//! counters and exponents stay JSON numbers; they are bounded well below 2^53.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TransportError;
use crate::chunker::{Chunk, ChunkResult, ExponentUnderTest};
use crate::codec;

/// Body of `GET /api/get-task`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub start_iter: u64,
    pub end_iter: u64,
    pub current_residue: String,
    pub prime_exponent: u64,
}

impl TaskMessage {
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            start_iter: chunk.start_iter(),
            end_iter: chunk.end_iter(),
            current_residue: codec::encode(chunk.current_residue()),
            prime_exponent: chunk.exponent().p(),
        }
    }

    /// Decode and validate into a chunk ready for execution
    pub fn into_chunk(self) -> Result<Chunk, TransportError> {
        debug!(p = self.prime_exponent, start = self.start_iter, end = self.end_iter, "into_chunk: called");
        // Checked before the modulus is built
        if self.end_iter > self.prime_exponent.saturating_sub(2) {
            return Err(TransportError::MalformedTask(format!(
                "end_iter {} exceeds the {} iterations of M{}",
                self.end_iter,
                self.prime_exponent.saturating_sub(2),
                self.prime_exponent
            )));
        }
        let residue = codec::decode(&self.current_residue)?;
        let exponent = ExponentUnderTest::new(self.prime_exponent)?;
        Ok(Chunk::new(exponent, self.start_iter, self.end_iter, residue)?)
    }
}

/// Body of `POST /api/submit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitMessage {
    pub start: u64,
    pub end: u64,
    pub residue: String,
    /// Lets the source route results when several exponents are open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prime_exponent: Option<u64>,
}

impl SubmitMessage {
    pub fn new(prime_exponent: u64, result: &ChunkResult) -> Self {
        Self {
            start: result.start_iter,
            end: result.end_iter,
            residue: codec::encode(&result.residue_after),
            prime_exponent: Some(prime_exponent),
        }
    }

    pub fn to_result(&self) -> Result<ChunkResult, TransportError> {
        Ok(ChunkResult {
            start_iter: self.start,
            end_iter: self.end,
            residue_after: codec::decode(&self.residue)?,
        })
    }
}

/// Body of `GET /api/range`: an inclusive integer range to scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeMessage {
    pub start: u64,
    pub end: u64,
}

impl RangeMessage {
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.start > self.end {
            return Err(TransportError::MalformedTask(format!(
                "range start {} is past end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            (self.end - self.start).saturating_add(1)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

/// One scanned candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub value: BigUint,
    pub is_prime: bool,
}

/// Body of `POST /api/submit-batch`: `{ "results": [["numeral", isPrime], ...] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMessage {
    pub results: Vec<(String, bool)>,
}

impl BatchMessage {
    pub fn new(results: &[ScanResult]) -> Self {
        Self {
            results: results
                .iter()
                .map(|r| (codec::encode(&r.value), r.is_prime))
                .collect(),
        }
    }

    /// Decode every numeral; any malformed entry rejects the whole batch
    pub fn decode(&self) -> Result<Vec<ScanResult>, TransportError> {
        self.results
            .iter()
            .map(|(numeral, is_prime)| {
                Ok(ScanResult {
                    value: codec::decode(numeral)?,
                    is_prime: *is_prime,
                })
            })
            .collect()
    }
}

/// Body of `GET /api/get-primes`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimesMessage {
    pub primes: Vec<String>,
}

impl PrimesMessage {
    pub fn decode(&self) -> Result<Vec<BigUint>, TransportError> {
        self.primes
            .iter()
            .map(|p| codec::decode(p).map_err(TransportError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecError;

    #[test]
    fn test_task_message_wire_shape() {
        let json = r#"{"start_iter":10,"end_iter":20,"current_residue":"1234","prime_exponent":61}"#;
        let msg: TaskMessage = serde_json::from_str(json).unwrap();
        let chunk = msg.into_chunk().unwrap();
        assert_eq!(chunk.exponent().p(), 61);
        assert_eq!(chunk.steps(), 10);
        assert_eq!(chunk.current_residue(), &BigUint::from(1234u32));

        let back = serde_json::to_value(TaskMessage::from_chunk(&chunk)).unwrap();
        assert_eq!(back["current_residue"], "1234");
        assert_eq!(back["prime_exponent"], 61);
    }

    #[test]
    fn test_task_message_rejects_bad_numeral() {
        let msg = TaskMessage {
            start_iter: 0,
            end_iter: 1,
            current_residue: "12x".to_string(),
            prime_exponent: 7,
        };
        assert!(matches!(
            msg.into_chunk(),
            Err(TransportError::Numeral(CodecError::MalformedNumeral(_)))
        ));
    }

    #[test]
    fn test_task_message_rejects_broken_invariants() {
        let past_end = TaskMessage {
            start_iter: 0,
            end_iter: 6,
            current_residue: "4".to_string(),
            prime_exponent: 7,
        };
        assert!(matches!(past_end.into_chunk(), Err(TransportError::MalformedTask(_))));

        let unreduced = TaskMessage {
            start_iter: 0,
            end_iter: 1,
            current_residue: "127".to_string(),
            prime_exponent: 7,
        };
        assert!(matches!(unreduced.into_chunk(), Err(TransportError::MalformedTask(_))));

        let tiny = TaskMessage {
            start_iter: 0,
            end_iter: 0,
            current_residue: "1".to_string(),
            prime_exponent: 2,
        };
        assert!(matches!(tiny.into_chunk(), Err(TransportError::MalformedTask(_))));
    }

    #[test]
    fn test_task_message_rejects_oversized_exponent() {
        let huge = TaskMessage {
            start_iter: 0,
            end_iter: 10,
            current_residue: "4".to_string(),
            prime_exponent: u64::MAX,
        };
        assert!(matches!(huge.into_chunk(), Err(TransportError::MalformedTask(_))));

        let past_end = TaskMessage {
            start_iter: 0,
            end_iter: u64::MAX,
            current_residue: "4".to_string(),
            prime_exponent: 1_000_000,
        };
        assert!(matches!(past_end.into_chunk(), Err(TransportError::MalformedTask(_))));
    }

    #[test]
    fn test_submit_message_carries_residue_as_string() {
        let result = ChunkResult {
            start_iter: 0,
            end_iter: 5,
            residue_after: BigUint::from(u64::MAX) * BigUint::from(u64::MAX),
        };
        let json = serde_json::to_value(SubmitMessage::new(127, &result)).unwrap();
        assert_eq!(json["start"], 0);
        assert_eq!(json["end"], 5);
        assert_eq!(json["residue"], "340282366920938463426481119284349108225");
        assert_eq!(json["prime_exponent"], 127);

        let plain: SubmitMessage = serde_json::from_str(r#"{"start":1,"end":2,"residue":"3"}"#).unwrap();
        assert_eq!(plain.prime_exponent, None);
        assert_eq!(plain.to_result().unwrap().residue_after, BigUint::from(3u32));
    }

    #[test]
    fn test_batch_message_shape() {
        let batch = BatchMessage::new(&[
            ScanResult {
                value: BigUint::from(7u32),
                is_prime: true,
            },
            ScanResult {
                value: BigUint::from(8u32),
                is_prime: false,
            },
        ]);
        let json = serde_json::to_string(&batch).unwrap();
        assert_eq!(json, r#"{"results":[["7",true],["8",false]]}"#);

        let parsed: BatchMessage = serde_json::from_str(r#"{"results":[["11",true],["x",false]]}"#).unwrap();
        assert!(parsed.decode().is_err());
    }

    #[test]
    fn test_range_message() {
        let range = RangeMessage { start: 100, end: 200 };
        assert_eq!(range.len(), 101);
        assert!(range.validate().is_ok());
        assert!(RangeMessage { start: 5, end: 4 }.validate().is_err());
    }
}
