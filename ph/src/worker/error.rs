//! Worker loop error taxonomy

use thiserror::Error;

use crate::chunker::ChunkError;
use crate::codec::CodecError;
use crate::engine::EngineError;
use crate::transport::TransportError;

/// Every way one iteration of the worker loop can fail
///
/// Only `ComputationFault` halts the loop; every other variant abandons the
/// current iteration and the loop carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("No task available")]
    TaskUnavailable,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed task: {0}")]
    MalformedTask(String),

    #[error("Chunk mismatch: {0}")]
    ChunkMismatch(String),

    #[error("Malformed numeral: {0}")]
    MalformedNumeral(String),

    #[error("Computation fault: {0}")]
    ComputationFault(String),
}

impl WorkerError {
    /// Whether the loop must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkerError::ComputationFault(_))
    }

    /// Whether the loop may carry on with the next iteration
    pub fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }

    /// Short stable name for events and logs
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::TaskUnavailable => "task_unavailable",
            WorkerError::Network(_) => "network",
            WorkerError::MalformedTask(_) => "malformed_task",
            WorkerError::ChunkMismatch(_) => "chunk_mismatch",
            WorkerError::MalformedNumeral(_) => "malformed_numeral",
            WorkerError::ComputationFault(_) => "computation_fault",
        }
    }
}

impl From<CodecError> for WorkerError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::MalformedNumeral(msg) => WorkerError::MalformedNumeral(msg),
        }
    }
}

impl From<EngineError> for WorkerError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ComputationFault(msg) => WorkerError::ComputationFault(msg),
        }
    }
}

impl From<ChunkError> for WorkerError {
    fn from(err: ChunkError) -> Self {
        match err {
            ChunkError::ChunkMismatch(msg) => WorkerError::ChunkMismatch(msg),
            ChunkError::MalformedTask(msg) => WorkerError::MalformedTask(msg),
            ChunkError::InvalidChunkSize => WorkerError::MalformedTask(err.to_string()),
        }
    }
}

impl From<TransportError> for WorkerError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::TaskUnavailable => WorkerError::TaskUnavailable,
            TransportError::Network(msg) => WorkerError::Network(msg),
            TransportError::MalformedTask(msg) => WorkerError::MalformedTask(msg),
            TransportError::Numeral(codec) => codec.into(),
            TransportError::ChunkMismatch(msg) => WorkerError::ChunkMismatch(msg),
            TransportError::Rejected { status, message } => {
                WorkerError::MalformedTask(format!("source answered HTTP {}: {}", status, message))
            }
        }
    }
}
