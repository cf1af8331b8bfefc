//! Chunk resumption protocol
//!
//! Splits a Lucas-Lehmer run into bounded iteration ranges and folds results
//! back into a per-exponent state machine.

mod chunk;
mod error;
mod tracker;

pub use chunk::{
    Chunk, ChunkResult, Completion, ExponentUnderTest, MAX_EXPONENT, MIN_EXPONENT, Position, Progress, next_chunk,
};
pub use error::ChunkError;
pub use tracker::{ExponentState, ExponentSummary, TaskChunker};
