//! Escalation engine error types.

use thiserror::Error;

/// Errors that abort the evaluation of a single service.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("state store error: {0}")]
    State(#[from] vigil_state::StateError),

    #[error("incident not found: {0}")]
    IncidentNotFound(u64),

    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("invalid maintenance window: {0}")]
    InvalidPause(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
