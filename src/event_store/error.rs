//! Event Log Errors
//!
//! Error types for event log operations.

/// Errors that can occur in the event log
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    /// Optimistic concurrency conflict
    #[error("Concurrency conflict for aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        aggregate_id: String,
        expected: i64,
        actual: i64,
    },

    /// Stored events for an aggregate cannot be read or decoded
    #[error("Event stream for aggregate {aggregate_id} is unreadable: {detail}")]
    Unreadable {
        aggregate_id: String,
        detail: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backing store error
    #[error("Event log backend error: {0}")]
    Backend(String),
}

impl EventLogError {
    /// Check if this error is a concurrency conflict
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, EventLogError::VersionConflict { .. })
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EventLogError::VersionConflict { .. } | EventLogError::Backend(_)
        )
    }
}
