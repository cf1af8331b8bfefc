//! Residue engine error types

use thiserror::Error;

/// Errors raised by the modular-arithmetic kernel
///
/// Every kernel failure is a `ComputationFault`. A wrong residue propagated
/// into later chunks would silently invalidate all downstream work, so callers
/// treat this as fatal and never retry it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Computation fault: {0}")]
    ComputationFault(String),
}

impl EngineError {
    pub fn fault(message: impl Into<String>) -> Self {
        EngineError::ComputationFault(message.into())
    }
}
