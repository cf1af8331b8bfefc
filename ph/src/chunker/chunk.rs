//! Exponent, chunk and result types
//!
//! A full Lucas-Lehmer run for `M_p` needs exactly `p - 2` squarings. Each
//! chunk carries the residue as of its own `start_iter`, so any worker can
//! pick up where the previous chunk ended without replaying from zero.

use std::fmt;
use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ChunkError;
use crate::engine::mersenne;

/// Smallest exponent the Lucas-Lehmer recurrence is defined for
///
/// `M_2 = 3` is prime but needs zero iterations and the residue `4 mod 3`
/// is nonzero, so callers handle `p = 2` on their own.
pub const MIN_EXPONENT: u64 = 3;

/// Largest exponent accepted; `2^p - 1` then fits in 512 MiB
pub const MAX_EXPONENT: u64 = u32::MAX as u64;

/// A Mersenne candidate `2^p - 1`
#[derive(Clone, PartialEq, Eq)]
pub struct ExponentUnderTest {
    p: u64,
    modulus: Arc<BigUint>,
}

impl ExponentUnderTest {
    pub fn new(p: u64) -> Result<Self, ChunkError> {
        debug!(p, "ExponentUnderTest::new: called");
        if p < MIN_EXPONENT {
            return Err(ChunkError::MalformedTask(format!(
                "exponent {} is below the Lucas-Lehmer minimum of {}",
                p, MIN_EXPONENT
            )));
        }
        if p > MAX_EXPONENT {
            return Err(ChunkError::MalformedTask(format!(
                "exponent {} is above the supported maximum of {}",
                p, MAX_EXPONENT
            )));
        }
        Ok(Self {
            p,
            modulus: Arc::new(mersenne(p)),
        })
    }

    pub fn p(&self) -> u64 {
        self.p
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Shared handle to the modulus for moving into blocking tasks
    pub fn modulus_arc(&self) -> Arc<BigUint> {
        Arc::clone(&self.modulus)
    }

    /// Total iterations for a complete test (`p - 2`)
    pub fn total_iterations(&self) -> u64 {
        self.p - 2
    }

    /// Residue at iteration zero (`4 mod M_p`)
    pub fn initial_residue(&self) -> BigUint {
        BigUint::from(4u32) % self.modulus.as_ref()
    }
}

impl fmt::Debug for ExponentUnderTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExponentUnderTest")
            .field("p", &self.p)
            .field("modulus_bits", &self.modulus.bits())
            .finish()
    }
}

impl fmt::Display for ExponentUnderTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.p)
    }
}

/// A claimed range of iterations `[start_iter, end_iter)` with its starting residue
#[derive(Clone, PartialEq, Eq)]
pub struct Chunk {
    exponent: ExponentUnderTest,
    start_iter: u64,
    end_iter: u64,
    current_residue: BigUint,
}

impl Chunk {
    /// Build a chunk, enforcing `start <= end <= p - 2` and `residue < M_p`
    pub fn new(
        exponent: ExponentUnderTest,
        start_iter: u64,
        end_iter: u64,
        current_residue: BigUint,
    ) -> Result<Self, ChunkError> {
        debug!(p = exponent.p(), start_iter, end_iter, "Chunk::new: called");
        if start_iter > end_iter {
            return Err(ChunkError::MalformedTask(format!(
                "start_iter {} is past end_iter {}",
                start_iter, end_iter
            )));
        }
        if end_iter > exponent.total_iterations() {
            return Err(ChunkError::MalformedTask(format!(
                "end_iter {} exceeds {} iterations required for {}",
                end_iter,
                exponent.total_iterations(),
                exponent
            )));
        }
        if &current_residue >= exponent.modulus() {
            return Err(ChunkError::MalformedTask(format!(
                "residue is not reduced modulo {}",
                exponent
            )));
        }
        Ok(Self {
            exponent,
            start_iter,
            end_iter,
            current_residue,
        })
    }

    pub fn exponent(&self) -> &ExponentUnderTest {
        &self.exponent
    }

    pub fn start_iter(&self) -> u64 {
        self.start_iter
    }

    pub fn end_iter(&self) -> u64 {
        self.end_iter
    }

    pub fn current_residue(&self) -> &BigUint {
        &self.current_residue
    }

    /// Number of squarings this chunk covers
    pub fn steps(&self) -> u64 {
        self.end_iter - self.start_iter
    }

    /// Whether finishing this chunk finishes the whole test
    pub fn is_final(&self) -> bool {
        self.end_iter == self.exponent.total_iterations()
    }

    /// Fold a result into this chunk, yielding the next state
    ///
    /// The result must cover exactly this chunk's range. A mismatch means the
    /// submission is stale or corrupted and must be discarded.
    pub fn apply_result(&self, result: &ChunkResult) -> Result<Progress, ChunkError> {
        debug!(
            p = self.exponent.p(),
            start = result.start_iter,
            end = result.end_iter,
            "Chunk::apply_result: called"
        );
        if result.start_iter != self.start_iter || result.end_iter != self.end_iter {
            debug!("Chunk::apply_result: range mismatch");
            return Err(ChunkError::ChunkMismatch(format!(
                "{} expected [{}, {}), got [{}, {})",
                self.exponent, self.start_iter, self.end_iter, result.start_iter, result.end_iter
            )));
        }
        if &result.residue_after >= self.exponent.modulus() {
            debug!("Chunk::apply_result: residue out of range");
            return Err(ChunkError::MalformedTask(format!(
                "result residue is not reduced modulo {}",
                self.exponent
            )));
        }

        if self.is_final() {
            debug!("Chunk::apply_result: final chunk");
            Ok(Progress::Complete(Completion {
                exponent: self.exponent.clone(),
                residue: result.residue_after.clone(),
            }))
        } else {
            Ok(Progress::Resume(Position {
                exponent: self.exponent.clone(),
                start_iter: self.end_iter,
                residue: result.residue_after.clone(),
            }))
        }
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("p", &self.exponent.p())
            .field("start_iter", &self.start_iter)
            .field("end_iter", &self.end_iter)
            .field("residue_bits", &self.current_residue.bits())
            .finish()
    }
}

/// Output of advancing a chunk to its `end_iter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub start_iter: u64,
    pub end_iter: u64,
    #[serde(with = "crate::codec::decimal")]
    pub residue_after: BigUint,
}

/// A resumable point in a test: the residue as of `start_iter`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub exponent: ExponentUnderTest,
    pub start_iter: u64,
    pub residue: BigUint,
}

impl Position {
    /// Iteration zero of a fresh test
    pub fn initial(exponent: ExponentUnderTest) -> Self {
        let residue = exponent.initial_residue();
        Self {
            exponent,
            start_iter: 0,
            residue,
        }
    }

    /// Derive the chunk starting here
    pub fn next_chunk(&self, max_chunk_size: u64) -> Result<Chunk, ChunkError> {
        next_chunk(&self.exponent, &self.residue, self.start_iter, max_chunk_size)
    }
}

/// A finished test; the residue is authoritative
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub exponent: ExponentUnderTest,
    pub residue: BigUint,
}

impl Completion {
    /// `M_p` is prime exactly when the final residue is zero
    pub fn is_prime(&self) -> bool {
        self.residue.is_zero()
    }
}

/// What folding a result produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Resume(Position),
    Complete(Completion),
}

/// Derive the chunk `[start_iter, min(start_iter + max_chunk_size, p - 2))`
pub fn next_chunk(
    exponent: &ExponentUnderTest,
    current_residue: &BigUint,
    start_iter: u64,
    max_chunk_size: u64,
) -> Result<Chunk, ChunkError> {
    debug!(p = exponent.p(), start_iter, max_chunk_size, "next_chunk: called");
    if max_chunk_size == 0 {
        return Err(ChunkError::InvalidChunkSize);
    }
    let end_iter = start_iter
        .saturating_add(max_chunk_size)
        .min(exponent.total_iterations());
    Chunk::new(exponent.clone(), start_iter, end_iter, current_residue.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{NativeEngine, ResidueEngine};
    use proptest::prelude::*;

    fn run(chunk: &Chunk) -> ChunkResult {
        let residue_after = NativeEngine::new()
            .advance(chunk.current_residue(), chunk.exponent().modulus(), chunk.steps())
            .unwrap();
        ChunkResult {
            start_iter: chunk.start_iter(),
            end_iter: chunk.end_iter(),
            residue_after,
        }
    }

    #[test]
    fn test_exponent_rejects_small_p() {
        assert!(ExponentUnderTest::new(2).is_err());
        assert!(ExponentUnderTest::new(0).is_err());
        let e = ExponentUnderTest::new(3).unwrap();
        assert_eq!(e.modulus(), &BigUint::from(7u32));
        assert_eq!(e.total_iterations(), 1);
        assert_eq!(e.initial_residue(), BigUint::from(4u32));
    }

    #[test]
    fn test_exponent_rejects_huge_p_without_allocating() {
        assert!(matches!(
            ExponentUnderTest::new(u64::MAX),
            Err(ChunkError::MalformedTask(_))
        ));
        assert!(ExponentUnderTest::new(MAX_EXPONENT + 1).is_err());
    }

    #[test]
    fn test_next_chunk_clamps_to_total() {
        let e = ExponentUnderTest::new(13).unwrap();
        let chunk = next_chunk(&e, &e.initial_residue(), 8, 100).unwrap();
        assert_eq!(chunk.start_iter(), 8);
        assert_eq!(chunk.end_iter(), 11);
        assert!(chunk.is_final());

        let chunk = next_chunk(&e, &e.initial_residue(), 0, 4).unwrap();
        assert_eq!(chunk.end_iter(), 4);
        assert!(!chunk.is_final());
    }

    #[test]
    fn test_next_chunk_saturates_on_huge_size() {
        let e = ExponentUnderTest::new(7).unwrap();
        let chunk = next_chunk(&e, &e.initial_residue(), 2, u64::MAX).unwrap();
        assert_eq!(chunk.end_iter(), 5);
    }

    #[test]
    fn test_next_chunk_rejects_zero_size() {
        let e = ExponentUnderTest::new(7).unwrap();
        assert_eq!(
            next_chunk(&e, &e.initial_residue(), 0, 0),
            Err(ChunkError::InvalidChunkSize)
        );
    }

    #[test]
    fn test_chunk_invariants() {
        let e = ExponentUnderTest::new(7).unwrap();
        assert!(Chunk::new(e.clone(), 3, 2, BigUint::from(4u32)).is_err());
        assert!(Chunk::new(e.clone(), 0, 6, BigUint::from(4u32)).is_err());
        assert!(Chunk::new(e.clone(), 0, 5, BigUint::from(127u32)).is_err());
        assert!(Chunk::new(e, 5, 5, BigUint::from(126u32)).is_ok());
    }

    #[test]
    fn test_apply_result_mismatch() {
        let e = ExponentUnderTest::new(13).unwrap();
        let chunk = next_chunk(&e, &e.initial_residue(), 0, 5).unwrap();
        let mut result = run(&chunk);
        result.start_iter = 1;
        assert!(matches!(chunk.apply_result(&result), Err(ChunkError::ChunkMismatch(_))));

        let mut result = run(&chunk);
        result.end_iter = 6;
        assert!(matches!(chunk.apply_result(&result), Err(ChunkError::ChunkMismatch(_))));
    }

    #[test]
    fn test_apply_result_rejects_unreduced_residue() {
        let e = ExponentUnderTest::new(5).unwrap();
        let chunk = next_chunk(&e, &e.initial_residue(), 0, 1).unwrap();
        let result = ChunkResult {
            start_iter: 0,
            end_iter: 1,
            residue_after: BigUint::from(31u32),
        };
        assert!(matches!(chunk.apply_result(&result), Err(ChunkError::MalformedTask(_))));
    }

    #[test]
    fn test_chunked_run_to_completion() {
        for (p, prime) in [(3u64, true), (4, false), (7, true), (11, false), (13, true)] {
            let e = ExponentUnderTest::new(p).unwrap();
            let mut position = Position::initial(e);
            let completion = loop {
                let chunk = position.next_chunk(2).unwrap();
                match chunk.apply_result(&run(&chunk)).unwrap() {
                    Progress::Resume(next) => position = next,
                    Progress::Complete(done) => break done,
                }
            };
            assert_eq!(completion.is_prime(), prime, "p = {}", p);
        }
    }

    proptest! {
        #[test]
        fn prop_chunk_splitting_is_associative(p in 3u64..160, a in 0u64..160, b in 0u64..160, c in 0u64..160) {
            let e = ExponentUnderTest::new(p).unwrap();
            let total = e.total_iterations();
            let mut cuts = [a % (total + 1), b % (total + 1), c % (total + 1)];
            cuts.sort_unstable();
            let [a, b, c] = cuts;

            let engine = NativeEngine::new();
            let start = engine.advance(&e.initial_residue(), e.modulus(), a).unwrap();

            let first = Chunk::new(e.clone(), a, b, start.clone()).unwrap();
            let position = match first.apply_result(&run(&first)).unwrap() {
                Progress::Resume(pos) => pos,
                Progress::Complete(done) => Position { exponent: e.clone(), start_iter: b, residue: done.residue },
            };
            let split = if c > b {
                let second = position.next_chunk(c - b).unwrap();
                prop_assert_eq!(second.end_iter(), c);
                run(&second).residue_after
            } else {
                position.residue
            };

            let whole = engine.advance(&start, e.modulus(), c - a).unwrap();
            prop_assert_eq!(split, whole);
        }
    }
}
