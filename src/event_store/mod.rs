//! Event Store module
//!
//! Append-only persistence for Event Sourcing, behind a narrow swappable
//! interface. The log exclusively owns the durable history of every
//! aggregate; resident actor state and projections are rebuildable caches.

mod error;
mod log;
mod memory;

pub use error::EventLogError;
pub use log::{AppendRequest, EventLog, StoredEvent, Version};
pub use memory::InMemoryEventLog;
