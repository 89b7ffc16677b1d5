//! Error handling module
//!
//! Centralized error types for callers of the fleet core.

use crate::domain::{DomainError, Rejection};
use crate::event_store::EventLogError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// One or more guard predicates rejected the command; nothing changed
    #[error("Command rejected: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Rejected(Vec<DomainError>),

    /// The entity has never been initialized
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Replay from the event log failed; the entity could not be activated
    #[error("Activation failed for {aggregate_id}: {detail}")]
    ActivationFailed {
        aggregate_id: String,
        detail: String,
    },

    /// The durable append failed after validation passed; the in-memory
    /// candidate state was discarded
    #[error("Commit failed: {0}")]
    CommitFailed(String),

    /// Event log error outside the commit path
    #[error(transparent)]
    EventLog(#[from] EventLogError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The structured rejection list, when this is a validation rejection.
    pub fn rejections(&self) -> Option<Vec<Rejection>> {
        match self {
            AppError::Rejected(reasons) => Some(reasons.iter().map(Rejection::from).collect()),
            _ => None,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, AppError::Rejected(_))
    }
}
