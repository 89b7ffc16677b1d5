//! Aggregate module
//!
//! Aggregate Root pattern implementation for Event Sourcing. Aggregates are
//! immutable value snapshots: `apply` consumes the old snapshot and returns
//! the new one, and `handle` is a pure guard-plus-event-constructor with no
//! I/O in either direction.

pub mod machine;
pub mod purchase;
pub mod sale;
pub mod snack;

pub use machine::{MachineCommand, SnackMachine};
pub use purchase::{Purchase, PurchaseCommand};
pub use sale::{SaleCommand, SaleMarker};
pub use snack::{Snack, SnackCommand};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use uuid::Uuid;

use crate::domain::{DomainError, DomainEvent, OperationContext};

/// When something happened and who did it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    pub at: DateTime<Utc>,
    pub by: Option<Uuid>,
}

impl AuditStamp {
    pub fn new(at: DateTime<Utc>, by: Option<Uuid>) -> Self {
        Self { at, by }
    }
}

/// Aggregate trait that all aggregates must implement.
///
/// Most aggregates are addressed by a `Uuid`; idempotency markers use a
/// composite string key, so the id type is associated rather than fixed.
pub trait Aggregate: Sized + Default + Clone + Send + Sync + 'static {
    /// The type of events this aggregate emits and folds
    type Event: DomainEvent;

    /// The commands this aggregate accepts
    type Command: Clone + Send + 'static;

    /// How this aggregate is addressed
    type Id: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static;

    /// Get the aggregate type name (for storage and stream namespaces)
    fn aggregate_type() -> &'static str;

    /// Get the aggregate ID
    fn id(&self) -> Self::Id;

    /// Get the current version (number of events applied)
    fn version(&self) -> i64;

    /// Apply an event to produce the next state snapshot
    fn apply(self, event: Self::Event) -> Self;

    /// Validate a command against the current state and construct the
    /// resulting events. An accepted command emits at most one event; an
    /// accepted no-op (e.g. returning money when exact change is
    /// impossible) emits none. A rejection lists every violated guard.
    fn handle(
        &self,
        command: Self::Command,
        ctx: &OperationContext,
    ) -> Result<Vec<Self::Event>, Vec<DomainError>>;

    /// True once the creation event has been applied
    fn is_initialized(&self) -> bool {
        self.version() > 0
    }

    /// Side-effect-free precondition check for a command
    fn can_handle(&self, command: Self::Command, ctx: &OperationContext) -> bool {
        self.handle(command, ctx).is_ok()
    }
}
