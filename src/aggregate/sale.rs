//! SaleMarker Aggregate
//!
//! Idempotency marker recording that one specific buy attempt has been
//! finalized into a purchase record. The marker is addressed by a composite
//! natural key (machine id + slot position + transaction id), so a retried
//! finalize lands on the same marker and becomes a no-op instead of
//! recording a second purchase.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DomainError, OperationContext, SaleEvent};

use super::Aggregate;

/// Build the composite key for one buy attempt.
pub fn sale_key(machine_id: Uuid, position: u32, transaction_id: Uuid) -> String {
    format!("{}:{}:{}", machine_id, position, transaction_id)
}

/// Commands accepted by a SaleMarker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SaleCommand {
    /// Mark this buy attempt as finalized under the given purchase id
    Finalize { sale_key: String, purchase_id: Uuid },
}

/// SaleMarker Aggregate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleMarker {
    sale_key: String,
    version: i64,
    purchase_id: Option<Uuid>,
}

impl SaleMarker {
    /// The purchase id pinned by the first finalize, if any.
    pub fn purchase_id(&self) -> Option<Uuid> {
        self.purchase_id
    }

    pub fn is_finalized(&self) -> bool {
        self.purchase_id.is_some()
    }
}

impl Aggregate for SaleMarker {
    type Event = SaleEvent;
    type Command = SaleCommand;
    type Id = String;

    fn aggregate_type() -> &'static str {
        "sale"
    }

    fn id(&self) -> String {
        self.sale_key.clone()
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn handle(
        &self,
        command: SaleCommand,
        _ctx: &OperationContext,
    ) -> Result<Vec<SaleEvent>, Vec<DomainError>> {
        match command {
            SaleCommand::Finalize {
                sale_key,
                purchase_id,
            } => {
                // Retried finalize: accepted no-op, nothing emitted.
                if self.is_finalized() {
                    return Ok(Vec::new());
                }
                Ok(vec![SaleEvent::SaleFinalized {
                    sale_key,
                    purchase_id,
                    finalized_at: Utc::now(),
                }])
            }
        }
    }

    fn apply(mut self, event: SaleEvent) -> Self {
        match event {
            SaleEvent::SaleFinalized {
                sale_key,
                purchase_id,
                ..
            } => {
                self.sale_key = sale_key;
                self.purchase_id = Some(purchase_id);
            }
        }

        self.version += 1;
        self
    }
}
