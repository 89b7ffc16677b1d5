//! Event Log interface
//!
//! The append-only store of committed events is the single source of truth
//! for every aggregate. The interface is deliberately narrow so the backing
//! store (in-memory map, file, embedded KV, external log service) is
//! swappable without touching aggregate logic.
//!
//! The trait returns boxed futures instead of using `async fn` so it can be
//! used as a trait object (`Arc<dyn EventLog>`).

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::OperationContext;

use super::EventLogError;

/// Monotonic per-aggregate event counter; starts at 0, incremented exactly
/// once per committed event.
pub type Version = i64;

/// A committed event as stored in the log.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub version: Version,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub actor: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// One event to be appended to an aggregate's stream.
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub expected_version: Version,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub actor: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
}

impl AppendRequest {
    /// Create an append request from a domain event.
    pub fn new<E: Serialize>(
        aggregate_type: &str,
        aggregate_id: impl Into<String>,
        expected_version: Version,
        event_type: &str,
        event: &E,
        context: &OperationContext,
    ) -> Result<Self, EventLogError> {
        let payload = serde_json::to_value(event)?;
        Ok(Self {
            aggregate_type: aggregate_type.to_string(),
            aggregate_id: aggregate_id.into(),
            expected_version,
            event_type: event_type.to_string(),
            payload,
            actor: context.actor_id,
            correlation_id: context.correlation_id,
        })
    }
}

/// Append-only, per-aggregate durable event store.
///
/// Implementations must be `Send + Sync`; all methods are logically
/// synchronous from the caller's point of view once the returned future
/// resolves. The runtime guarantees a single writer per aggregate id, so
/// `expected_version` mismatches indicate a log-level invariant violation
/// rather than routine contention.
pub trait EventLog: Send + Sync {
    /// Append one event; returns the committed record, whose `version` is
    /// `expected_version + 1`.
    fn append(&self, request: AppendRequest) -> BoxFuture<'_, Result<StoredEvent, EventLogError>>;

    /// All events for one aggregate, oldest to newest.
    fn read_all(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> BoxFuture<'_, Result<Vec<StoredEvent>, EventLogError>>;

    /// All committed events for one aggregate type, for catch-up consumers.
    /// Ordered by commit time; per-aggregate version order is preserved.
    fn read_namespace(
        &self,
        aggregate_type: &str,
    ) -> BoxFuture<'_, Result<Vec<StoredEvent>, EventLogError>>;

    /// The ids of every aggregate of one type that has at least one event.
    fn ids(&self, aggregate_type: &str) -> BoxFuture<'_, Result<Vec<String>, EventLogError>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DomainEvent, SaleEvent};

    #[test]
    fn test_append_request_from_event() {
        let event = SaleEvent::SaleFinalized {
            sale_key: "m:0:t".to_string(),
            purchase_id: Uuid::new_v4(),
            finalized_at: Utc::now(),
        };
        let actor = Uuid::new_v4();
        let context = OperationContext::new().with_actor(actor);

        let request = AppendRequest::new(
            "sale",
            "m:0:t",
            0,
            event.event_type(),
            &event,
            &context,
        )
        .unwrap();

        assert_eq!(request.aggregate_type, "sale");
        assert_eq!(request.aggregate_id, "m:0:t");
        assert_eq!(request.expected_version, 0);
        assert_eq!(request.event_type, "SaleFinalized");
        assert_eq!(request.actor, Some(actor));
        assert!(request.payload.get("purchase_id").is_some());
    }
}
