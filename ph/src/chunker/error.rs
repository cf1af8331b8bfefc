//! Chunk state machine errors

use thiserror::Error;

/// Errors raised while deriving, admitting or folding chunks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    /// The result does not belong to the chunk or position it claims to
    #[error("Chunk mismatch: {0}")]
    ChunkMismatch(String),

    /// The task violates the chunk invariants
    #[error("Malformed task: {0}")]
    MalformedTask(String),

    #[error("Chunk size must be at least one iteration")]
    InvalidChunkSize,
}
