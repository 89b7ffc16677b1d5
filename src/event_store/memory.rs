//! In-memory Event Log
//!
//! Append-only map of per-aggregate event streams. The default backend for
//! the fleet; real deployments substitute a durable `EventLog`
//! implementation behind the same trait.

use chrono::Utc;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{AppendRequest, EventLog, EventLogError, StoredEvent, Version};

type StreamKey = (String, String);

/// In-memory append-only event streams keyed by (aggregate_type, id).
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    streams: Mutex<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed events for one aggregate (test/inspection aid).
    pub fn stream_len(&self, aggregate_type: &str, aggregate_id: &str) -> usize {
        let streams = self.streams.lock().expect("event log lock poisoned");
        streams
            .get(&(aggregate_type.to_string(), aggregate_id.to_string()))
            .map_or(0, Vec::len)
    }
}

impl EventLog for InMemoryEventLog {
    fn append(&self, request: AppendRequest) -> BoxFuture<'_, Result<StoredEvent, EventLogError>> {
        let result = (|| {
            let mut streams = self
                .streams
                .lock()
                .map_err(|e| EventLogError::Backend(e.to_string()))?;
            let key = (request.aggregate_type.clone(), request.aggregate_id.clone());
            let stream = streams.entry(key).or_default();

            let current = stream.last().map_or(0, |e| e.version);
            if current != request.expected_version {
                return Err(EventLogError::VersionConflict {
                    aggregate_id: request.aggregate_id,
                    expected: request.expected_version,
                    actual: current,
                });
            }

            let committed = StoredEvent {
                id: Uuid::new_v4(),
                aggregate_type: request.aggregate_type,
                aggregate_id: request.aggregate_id,
                version: current + 1,
                event_type: request.event_type,
                payload: request.payload,
                actor: request.actor,
                correlation_id: request.correlation_id,
                created_at: Utc::now(),
            };
            stream.push(committed.clone());
            Ok(committed)
        })();

        Box::pin(async move { result })
    }

    fn read_all(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> BoxFuture<'_, Result<Vec<StoredEvent>, EventLogError>> {
        let result = self
            .streams
            .lock()
            .map_err(|e| EventLogError::Backend(e.to_string()))
            .map(|streams| {
                streams
                    .get(&(aggregate_type.to_string(), aggregate_id.to_string()))
                    .cloned()
                    .unwrap_or_default()
            });

        Box::pin(async move { result })
    }

    fn read_namespace(
        &self,
        aggregate_type: &str,
    ) -> BoxFuture<'_, Result<Vec<StoredEvent>, EventLogError>> {
        let result = self
            .streams
            .lock()
            .map_err(|e| EventLogError::Backend(e.to_string()))
            .map(|streams| {
                let mut events: Vec<StoredEvent> = streams
                    .iter()
                    .filter(|((kind, _), _)| kind == aggregate_type)
                    .flat_map(|(_, stream)| stream.iter().cloned())
                    .collect();
                events.sort_by(|a, b| {
                    a.created_at
                        .cmp(&b.created_at)
                        .then_with(|| a.aggregate_id.cmp(&b.aggregate_id))
                        .then_with(|| a.version.cmp(&b.version))
                });
                events
            });

        Box::pin(async move { result })
    }

    fn ids(&self, aggregate_type: &str) -> BoxFuture<'_, Result<Vec<String>, EventLogError>> {
        let result = self
            .streams
            .lock()
            .map_err(|e| EventLogError::Backend(e.to_string()))
            .map(|streams| {
                let mut ids: Vec<String> = streams
                    .keys()
                    .filter(|(kind, _)| kind == aggregate_type)
                    .map(|(_, id)| id.clone())
                    .collect();
                ids.sort();
                ids
            });

        Box::pin(async move { result })
    }
}
