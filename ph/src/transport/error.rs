//! Transport error types

use thiserror::Error;

use crate::chunker::ChunkError;
use crate::codec::CodecError;

/// Errors that can occur talking to the task source
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No task available")]
    TaskUnavailable,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed task: {0}")]
    MalformedTask(String),

    #[error(transparent)]
    Numeral(#[from] CodecError),

    #[error("Submission rejected as stale: {0}")]
    ChunkMismatch(String),

    #[error("Task source rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl TransportError {
    /// Whether the request never reached a definite answer
    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::Network(_))
    }

    /// Map an HTTP status the source answered with
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            204 => TransportError::TaskUnavailable,
            409 => TransportError::ChunkMismatch(message),
            408 | 429 | 500..=599 => TransportError::Network(format!("HTTP {}: {}", status, message)),
            _ => TransportError::Rejected { status, message },
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::MalformedTask(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl From<ChunkError> for TransportError {
    fn from(err: ChunkError) -> Self {
        match err {
            ChunkError::ChunkMismatch(msg) => TransportError::ChunkMismatch(msg),
            other => TransportError::MalformedTask(other.to_string()),
        }
    }
}
