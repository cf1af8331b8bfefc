//! Task source error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use primehack::{ChunkError, TransportError};
use thiserror::Error;

/// Reasons the ledger refuses a submission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Stale or mismatched: the result does not fit the current state
    #[error("Chunk mismatch: {0}")]
    Mismatch(String),

    /// The request itself is unusable (bad numeral, unreduced residue)
    #[error("Malformed submission: {0}")]
    Malformed(String),
}

impl LedgerError {
    pub fn status(&self) -> StatusCode {
        match self {
            LedgerError::Mismatch(_) => StatusCode::CONFLICT,
            LedgerError::Malformed(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<ChunkError> for LedgerError {
    fn from(err: ChunkError) -> Self {
        match err {
            ChunkError::ChunkMismatch(msg) => LedgerError::Mismatch(msg),
            other => LedgerError::Malformed(other.to_string()),
        }
    }
}

impl From<TransportError> for LedgerError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ChunkMismatch(msg) => LedgerError::Mismatch(msg),
            other => LedgerError::Malformed(other.to_string()),
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primehack::CodecError;

    #[test]
    fn test_status_mapping() {
        let err: LedgerError = ChunkError::ChunkMismatch("stale".to_string()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: LedgerError = TransportError::Numeral(CodecError::MalformedNumeral("-1".to_string())).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: LedgerError = ChunkError::MalformedTask("residue not reduced".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
