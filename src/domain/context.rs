//! Operation Context
//!
//! Metadata about the current operation, recorded into audit stamps and
//! committed events.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context for a command, used for auditing and idempotency keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Who issued the command (operator, customer terminal, system job)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,

    /// Correlation ID for tracing one logical operation across aggregates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl OperationContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self {
            actor_id: None,
            correlation_id: None,
        }
    }

    /// Create context with an acting user
    pub fn with_actor(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Create context with correlation ID
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let actor_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        let context = OperationContext::new()
            .with_actor(actor_id)
            .with_correlation_id(correlation_id);

        assert_eq!(context.actor_id, Some(actor_id));
        assert_eq!(context.correlation_id, Some(correlation_id));
    }

    #[test]
    fn test_ensure_correlation_id() {
        let mut context = OperationContext::new();
        assert!(context.correlation_id.is_none());

        let id = context.ensure_correlation_id();
        assert_eq!(context.correlation_id, Some(id));

        // Calling again should return the same ID
        let id2 = context.ensure_correlation_id();
        assert_eq!(id, id2);
    }
}
