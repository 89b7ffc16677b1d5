//! Event Stream
//!
//! Ordered per-namespace fan-out of committed events and observability-only
//! error events. Each aggregate type gets its own namespace
//! (`machine-events`, `snack-events`, ...); within a namespace, events for
//! one aggregate id arrive in commit order (monotonically increasing
//! Version). Delivery is best-effort broadcast: a lagging subscriber loses
//! the oldest buffered messages and repairs itself through the
//! synchronizer's catch-up paths.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::domain::Rejection;
use crate::event_store::StoredEvent;

/// Default per-namespace broadcast buffer.
pub const DEFAULT_STREAM_CAPACITY: usize = 1024;

/// Namespace name for an aggregate type.
pub fn namespace(aggregate_type: &str) -> String {
    format!("{aggregate_type}-events")
}

/// A guard rejection, published for observability only. Does not affect the
/// aggregate's Version and never appears in the log.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub reasons: Vec<Rejection>,
    pub occurred_at: DateTime<Utc>,
}

/// Message published on a namespace.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    /// An event that has been durably committed to the log
    Committed(StoredEvent),

    /// A command rejection (observability only)
    Rejected(ErrorEvent),
}

/// Per-namespace broadcast channels for committed and error events.
#[derive(Debug, Clone)]
pub struct EventStream {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<StreamMessage>>>>,
    capacity: usize,
}

impl EventStream {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    fn sender(&self, namespace: &str) -> broadcast::Sender<StreamMessage> {
        let mut channels = self.channels.lock().expect("stream lock poisoned");
        channels
            .entry(namespace.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Subscribe to one namespace. Only messages published after the
    /// subscription are delivered; use the log's catch-up read for history.
    pub fn subscribe(&self, namespace: &str) -> broadcast::Receiver<StreamMessage> {
        self.sender(namespace).subscribe()
    }

    /// Publish a committed event to its aggregate type's namespace.
    pub fn publish_committed(&self, event: StoredEvent) {
        let ns = namespace(&event.aggregate_type);
        // A send error just means nobody is subscribed right now.
        let _ = self.sender(&ns).send(StreamMessage::Committed(event));
    }

    /// Publish a rejection to its aggregate type's namespace.
    pub fn publish_rejection(&self, error: ErrorEvent) {
        let ns = namespace(&error.aggregate_type);
        let _ = self.sender(&ns).send(StreamMessage::Rejected(error));
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn stored(id: &str, version: i64) -> StoredEvent {
        StoredEvent {
            id: Uuid::new_v4(),
            aggregate_type: "machine".to_string(),
            aggregate_id: id.to_string(),
            version,
            event_type: "TestEvent".to_string(),
            payload: json!({}),
            actor: None,
            correlation_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_committed_events_arrive_in_publish_order() {
        let stream = EventStream::default();
        let mut rx = stream.subscribe("machine-events");

        stream.publish_committed(stored("m-1", 1));
        stream.publish_committed(stored("m-1", 2));

        match rx.recv().await.unwrap() {
            StreamMessage::Committed(e) => assert_eq!(e.version, 1),
            other => panic!("unexpected message: {other:?}"),
        }
        match rx.recv().await.unwrap() {
            StreamMessage::Committed(e) => assert_eq!(e.version, 2),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let stream = EventStream::default();
        let mut machines = stream.subscribe("machine-events");
        let mut snacks = stream.subscribe("snack-events");

        stream.publish_committed(stored("m-1", 1));

        assert!(machines.recv().await.is_ok());
        assert!(snacks.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let stream = EventStream::default();
        stream.publish_committed(stored("m-1", 1));
    }

    #[tokio::test]
    async fn test_rejections_are_published() {
        let stream = EventStream::default();
        let mut rx = stream.subscribe("machine-events");

        stream.publish_rejection(ErrorEvent {
            aggregate_type: "machine".to_string(),
            aggregate_id: "m-1".to_string(),
            reasons: vec![Rejection {
                code: 1104,
                reason: "Insufficient credit".to_string(),
            }],
            occurred_at: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            StreamMessage::Rejected(e) => {
                assert_eq!(e.reasons[0].code, 1104);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
