//! TaskChunker - per-exponent resumable state machine
//!
//! ```text
//! Unclaimed ──open/admit──▶ InProgress(start_iter, residue) ──apply_result──▶ Completed
//!                              │         ▲
//!                              ▼         │ open / admit
//!                            Abandoned ──┘
//! ```
//!
//! Both sides of the protocol use the same machine: the task source to issue
//! chunks and fold submissions, the worker to validate claims and record what
//! it computed.

use std::collections::BTreeMap;

use num_bigint::BigUint;
use serde::Serialize;
use tracing::{debug, info};

use super::{Chunk, ChunkError, ChunkResult, ExponentUnderTest, Position, Progress};

/// Lifecycle of one exponent under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExponentState {
    Unclaimed,
    InProgress { start_iter: u64, residue: BigUint },
    Completed { residue: BigUint, is_prime: bool },
    Abandoned { start_iter: u64, residue: BigUint },
}

impl ExponentState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unclaimed => "unclaimed",
            Self::InProgress { .. } => "in_progress",
            Self::Completed { .. } => "completed",
            Self::Abandoned { .. } => "abandoned",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Read-only view of one tracked exponent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExponentSummary {
    pub prime_exponent: u64,
    pub state: &'static str,
    pub position: u64,
    pub total_iterations: u64,
    pub is_prime: Option<bool>,
}

#[derive(Debug, Clone)]
struct Entry {
    exponent: ExponentUnderTest,
    state: ExponentState,
}

impl Entry {
    fn summary(&self) -> ExponentSummary {
        let total = self.exponent.total_iterations();
        let (position, is_prime) = match &self.state {
            ExponentState::Unclaimed => (0, None),
            ExponentState::InProgress { start_iter, .. } | ExponentState::Abandoned { start_iter, .. } => {
                (*start_iter, None)
            }
            ExponentState::Completed { is_prime, .. } => (total, Some(*is_prime)),
        };
        ExponentSummary {
            prime_exponent: self.exponent.p(),
            state: self.state.name(),
            position,
            total_iterations: total,
            is_prime,
        }
    }
}

/// Tracks the resumable position of every exponent it has seen
#[derive(Debug, Default)]
pub struct TaskChunker {
    entries: BTreeMap<u64, Entry>,
}

impl TaskChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an exponent without starting it
    pub fn register(&mut self, exponent: ExponentUnderTest) {
        debug!(p = exponent.p(), "register: called");
        self.entries.entry(exponent.p()).or_insert(Entry {
            exponent,
            state: ExponentState::Unclaimed,
        });
    }

    /// Start an exponent at iteration zero, or resume it where it stopped
    ///
    /// Completed exponents cannot be reopened.
    pub fn open(&mut self, exponent: ExponentUnderTest) -> Result<Position, ChunkError> {
        let p = exponent.p();
        debug!(p, "open: called");
        self.register(exponent);
        let entry = self.entry_mut(p)?;

        let (start_iter, residue) = match &entry.state {
            ExponentState::Unclaimed => {
                debug!(p, "open: fresh exponent");
                (0, entry.exponent.initial_residue())
            }
            ExponentState::InProgress { start_iter, residue } | ExponentState::Abandoned { start_iter, residue } => {
                debug!(p, start_iter, "open: resuming");
                (*start_iter, residue.clone())
            }
            ExponentState::Completed { .. } => {
                debug!(p, "open: already completed");
                return Err(ChunkError::ChunkMismatch(format!("M{} is already fully tested", p)));
            }
        };

        entry.state = ExponentState::InProgress {
            start_iter,
            residue: residue.clone(),
        };
        Ok(Position {
            exponent: entry.exponent.clone(),
            start_iter,
            residue,
        })
    }

    /// Resume an abandoned (or in-progress) exponent by number
    pub fn reopen(&mut self, p: u64) -> Result<Position, ChunkError> {
        debug!(p, "reopen: called");
        let exponent = self.entry_mut(p)?.exponent.clone();
        self.open(exponent)
    }

    /// Current resumable position of an in-progress exponent
    pub fn position(&self, p: u64) -> Option<Position> {
        let entry = self.entries.get(&p)?;
        match &entry.state {
            ExponentState::InProgress { start_iter, residue } => Some(Position {
                exponent: entry.exponent.clone(),
                start_iter: *start_iter,
                residue: residue.clone(),
            }),
            _ => None,
        }
    }

    /// Derive the next chunk for an in-progress exponent
    pub fn issue(&self, p: u64, max_chunk_size: u64) -> Result<Chunk, ChunkError> {
        debug!(p, max_chunk_size, "issue: called");
        let position = self
            .position(p)
            .ok_or_else(|| ChunkError::ChunkMismatch(format!("M{} is not in progress", p)))?;
        position.next_chunk(max_chunk_size)
    }

    /// Accept a chunk handed out by the task source
    ///
    /// The source is the authority on where an exponent stands, so the tracked
    /// position is replaced by the chunk's starting point.
    pub fn admit(&mut self, chunk: &Chunk) -> Result<(), ChunkError> {
        let p = chunk.exponent().p();
        debug!(p, start = chunk.start_iter(), end = chunk.end_iter(), "admit: called");
        self.register(chunk.exponent().clone());
        let entry = self.entry_mut(p)?;
        if entry.state.is_completed() {
            debug!(p, "admit: exponent already completed");
            return Err(ChunkError::ChunkMismatch(format!("M{} is already fully tested", p)));
        }
        entry.state = ExponentState::InProgress {
            start_iter: chunk.start_iter(),
            residue: chunk.current_residue().clone(),
        };
        Ok(())
    }

    /// Fold a result for `chunk` into the tracked state
    ///
    /// The chunk must start at the tracked position with the tracked residue,
    /// and the result must cover exactly the chunk. On any error the tracked
    /// state is left untouched.
    pub fn apply_result(&mut self, chunk: &Chunk, result: &ChunkResult) -> Result<Progress, ChunkError> {
        let p = chunk.exponent().p();
        debug!(p, start = result.start_iter, end = result.end_iter, "apply_result: called");
        let entry = self
            .entries
            .get_mut(&p)
            .ok_or_else(|| ChunkError::ChunkMismatch(format!("M{} is not tracked", p)))?;

        match &entry.state {
            ExponentState::InProgress { start_iter, residue }
                if *start_iter == chunk.start_iter() && residue == chunk.current_residue() =>
            {
                debug!(p, "apply_result: chunk matches tracked position");
            }
            ExponentState::InProgress { start_iter, .. } => {
                debug!(p, start_iter, "apply_result: stale chunk");
                return Err(ChunkError::ChunkMismatch(format!(
                    "M{} is at iteration {}, chunk starts at {}",
                    p,
                    start_iter,
                    chunk.start_iter()
                )));
            }
            other => {
                debug!(p, state = other.name(), "apply_result: exponent not in progress");
                return Err(ChunkError::ChunkMismatch(format!("M{} is {}", p, other.name())));
            }
        }

        let progress = chunk.apply_result(result)?;
        entry.state = match &progress {
            Progress::Resume(next) => ExponentState::InProgress {
                start_iter: next.start_iter,
                residue: next.residue.clone(),
            },
            Progress::Complete(done) => {
                info!(p, is_prime = done.is_prime(), "Lucas-Lehmer test complete for M{}", p);
                ExponentState::Completed {
                    residue: done.residue.clone(),
                    is_prime: done.is_prime(),
                }
            }
        };
        Ok(progress)
    }

    /// Give up on an in-progress exponent, keeping its last good position
    pub fn abandon(&mut self, p: u64) -> bool {
        debug!(p, "abandon: called");
        let Some(entry) = self.entries.get_mut(&p) else {
            return false;
        };
        match std::mem::replace(&mut entry.state, ExponentState::Unclaimed) {
            ExponentState::InProgress { start_iter, residue } => {
                entry.state = ExponentState::Abandoned { start_iter, residue };
                true
            }
            other => {
                entry.state = other;
                false
            }
        }
    }

    /// Stop tracking an exponent altogether
    pub fn forget(&mut self, p: u64) -> bool {
        debug!(p, "forget: called");
        self.entries.remove(&p).is_some()
    }

    /// Keep only the exponents for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(u64) -> bool) {
        self.entries.retain(|p, _| keep(*p));
    }

    pub fn state(&self, p: u64) -> Option<&ExponentState> {
        self.entries.get(&p).map(|e| &e.state)
    }

    /// Exponents that are started but not finished, lowest first
    pub fn in_progress(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries
            .values()
            .filter(|e| matches!(e.state, ExponentState::InProgress { .. }))
            .map(|e| e.exponent.p())
    }

    /// Exponents that are started but not finished, in progress or abandoned, lowest first
    pub fn resumable(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries
            .values()
            .filter(|e| {
                matches!(
                    e.state,
                    ExponentState::InProgress { .. } | ExponentState::Abandoned { .. }
                )
            })
            .map(|e| e.exponent.p())
    }

    pub fn summaries(&self) -> Vec<ExponentSummary> {
        self.entries.values().map(Entry::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_mut(&mut self, p: u64) -> Result<&mut Entry, ChunkError> {
        self.entries
            .get_mut(&p)
            .ok_or_else(|| ChunkError::ChunkMismatch(format!("M{} is not tracked", p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{NativeEngine, ResidueEngine};

    fn compute(chunk: &Chunk) -> ChunkResult {
        let residue_after = NativeEngine::new()
            .advance(chunk.current_residue(), chunk.exponent().modulus(), chunk.steps())
            .unwrap();
        ChunkResult {
            start_iter: chunk.start_iter(),
            end_iter: chunk.end_iter(),
            residue_after,
        }
    }

    fn exponent(p: u64) -> ExponentUnderTest {
        ExponentUnderTest::new(p).unwrap()
    }

    #[test]
    fn test_open_starts_at_zero() {
        let mut chunker = TaskChunker::new();
        let pos = chunker.open(exponent(13)).unwrap();
        assert_eq!(pos.start_iter, 0);
        assert_eq!(pos.residue, BigUint::from(4u32));
        assert_eq!(chunker.state(13).unwrap().name(), "in_progress");
    }

    #[test]
    fn test_issue_and_apply_until_complete() {
        let mut chunker = TaskChunker::new();
        chunker.open(exponent(13)).unwrap();

        let mut rounds = 0;
        loop {
            let chunk = chunker.issue(13, 4).unwrap();
            rounds += 1;
            match chunker.apply_result(&chunk, &compute(&chunk)).unwrap() {
                Progress::Resume(pos) => assert_eq!(pos.start_iter, chunk.end_iter()),
                Progress::Complete(done) => {
                    assert!(done.is_prime());
                    break;
                }
            }
        }
        assert_eq!(rounds, 3); // 11 iterations in chunks of 4
        assert_eq!(
            chunker.state(13),
            Some(&ExponentState::Completed {
                residue: BigUint::from(0u32),
                is_prime: true
            })
        );
        assert!(chunker.open(exponent(13)).is_err());
    }

    #[test]
    fn test_stale_start_is_rejected_and_state_unchanged() {
        let mut chunker = TaskChunker::new();
        chunker.open(exponent(31)).unwrap();

        let first = chunker.issue(31, 10).unwrap();
        chunker.apply_result(&first, &compute(&first)).unwrap();
        let before = chunker.state(31).cloned();

        // Replaying the first chunk no longer matches the tracked position
        let err = chunker.apply_result(&first, &compute(&first)).unwrap_err();
        assert!(matches!(err, ChunkError::ChunkMismatch(_)));
        assert_eq!(chunker.state(31).cloned(), before);
    }

    #[test]
    fn test_mismatched_result_range_leaves_state_unchanged() {
        let mut chunker = TaskChunker::new();
        chunker.open(exponent(31)).unwrap();
        let chunk = chunker.issue(31, 10).unwrap();
        let before = chunker.state(31).cloned();

        let mut result = compute(&chunk);
        result.start_iter += 1;
        let err = chunker.apply_result(&chunk, &result).unwrap_err();
        assert!(matches!(err, ChunkError::ChunkMismatch(_)));
        assert_eq!(chunker.state(31).cloned(), before);
    }

    #[test]
    fn test_admit_takes_source_position() {
        let mut chunker = TaskChunker::new();
        let e = exponent(61);
        let residue = NativeEngine::new().advance(&e.initial_residue(), e.modulus(), 20).unwrap();
        let chunk = Chunk::new(e, 20, 40, residue.clone()).unwrap();

        chunker.admit(&chunk).unwrap();
        assert_eq!(
            chunker.state(61),
            Some(&ExponentState::InProgress {
                start_iter: 20,
                residue
            })
        );
        assert!(matches!(
            chunker.apply_result(&chunk, &compute(&chunk)).unwrap(),
            Progress::Resume(_)
        ));
    }

    #[test]
    fn test_abandon_keeps_position_for_reopen() {
        let mut chunker = TaskChunker::new();
        chunker.open(exponent(17)).unwrap();
        let chunk = chunker.issue(17, 5).unwrap();
        chunker.apply_result(&chunk, &compute(&chunk)).unwrap();

        assert!(chunker.abandon(17));
        assert_eq!(chunker.state(17).unwrap().name(), "abandoned");
        assert!(!chunker.abandon(17));
        assert_eq!(chunker.in_progress().count(), 0);
        assert_eq!(chunker.resumable().collect::<Vec<_>>(), vec![17]);

        let pos = chunker.reopen(17).unwrap();
        assert_eq!(pos.start_iter, 5);
        assert_eq!(chunker.in_progress().collect::<Vec<_>>(), vec![17]);
        assert!(chunker.reopen(19).is_err());
    }

    #[test]
    fn test_apply_on_untracked_exponent() {
        let mut chunker = TaskChunker::new();
        let e = exponent(7);
        let chunk = Chunk::new(e.clone(), 0, 5, e.initial_residue()).unwrap();
        assert!(matches!(
            chunker.apply_result(&chunk, &compute(&chunk)),
            Err(ChunkError::ChunkMismatch(_))
        ));
    }

    #[test]
    fn test_forget_and_retain() {
        let mut chunker = TaskChunker::new();
        for p in [5, 7, 13] {
            chunker.open(exponent(p)).unwrap();
        }
        assert!(chunker.forget(5));
        assert!(!chunker.forget(5));
        chunker.retain(|p| p == 13);
        assert_eq!(chunker.len(), 1);
        assert!(chunker.state(13).is_some());
    }

    #[test]
    fn test_summaries() {
        let mut chunker = TaskChunker::new();
        chunker.open(exponent(5)).unwrap();
        chunker.register(exponent(7));
        let chunk = chunker.issue(5, 100).unwrap();
        chunker.apply_result(&chunk, &compute(&chunk)).unwrap();

        let summaries = chunker.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].prime_exponent, 5);
        assert_eq!(summaries[0].state, "completed");
        assert_eq!(summaries[0].is_prime, Some(true));
        assert_eq!(summaries[1].state, "unclaimed");
        assert_eq!(summaries[1].position, 0);
    }
}
