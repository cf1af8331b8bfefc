//! Local Lucas-Lehmer runs
//!
//! Drives one exponent to completion through the same chunk state machine a
//! task source uses, without any network in between.

use num_bigint::BigUint;
use serde::Serialize;
use tracing::{debug, info};

use crate::chunker::{Chunk, ExponentUnderTest, MIN_EXPONENT, Progress, TaskChunker};
use crate::codec;
use crate::engine::ResidueEngine;
use crate::worker::WorkerError;

/// Outcome of a local test of `2^p - 1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub prime_exponent: u64,
    pub is_prime: bool,
    pub iterations: u64,
    pub chunks: u64,
    /// Low 64 bits of the final residue, hex
    pub res64: String,
}

/// Test `2^p - 1` in chunks of at most `chunk_size` iterations
///
/// `p = 2` needs no iterations: `M_2 = 3` is prime. Smaller exponents are
/// rejected. `on_chunk` is called after every folded chunk.
pub fn lucas_lehmer(
    engine: &dyn ResidueEngine,
    p: u64,
    chunk_size: u64,
    mut on_chunk: impl FnMut(&Chunk),
) -> Result<CheckReport, WorkerError> {
    debug!(p, chunk_size, "lucas_lehmer: called");
    if p == 2 {
        return Ok(CheckReport {
            prime_exponent: 2,
            is_prime: true,
            iterations: 0,
            chunks: 0,
            res64: codec::res64(&BigUint::from(0u32)),
        });
    }
    if p < MIN_EXPONENT {
        return Err(WorkerError::MalformedTask(format!("exponent {} is below 2", p)));
    }

    let mut chunker = TaskChunker::new();
    let exponent = ExponentUnderTest::new(p)?;
    let total = exponent.total_iterations();
    chunker.open(exponent)?;

    let mut chunks = 0;
    loop {
        let chunk = chunker.issue(p, chunk_size)?;
        let residue_after = engine.advance(chunk.current_residue(), chunk.exponent().modulus(), chunk.steps())?;
        let result = crate::chunker::ChunkResult {
            start_iter: chunk.start_iter(),
            end_iter: chunk.end_iter(),
            residue_after,
        };
        let progress = chunker.apply_result(&chunk, &result)?;
        chunks += 1;
        on_chunk(&chunk);

        if let Progress::Complete(done) = progress {
            info!("Local check of {} finished after {} chunks", done.exponent, chunks);
            return Ok(CheckReport {
                prime_exponent: p,
                is_prime: done.is_prime(),
                iterations: total,
                chunks,
                res64: codec::res64(&done.residue),
            });
        }
    }
}
