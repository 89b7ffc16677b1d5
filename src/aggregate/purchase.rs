//! Purchase Aggregate
//!
//! Write-once evidence of a completed sale. A purchase is recorded exactly
//! once and never mutated afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DomainError, OperationContext, PurchaseEvent};

use super::Aggregate;

/// Commands accepted by a Purchase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PurchaseCommand {
    /// Record a completed sale
    Initialize {
        purchase_id: Uuid,
        machine_id: Uuid,
        slot_position: u32,
        snack_id: Uuid,
        price: Decimal,
        bought_at: DateTime<Utc>,
    },
}

/// Purchase Aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    id: Uuid,
    version: i64,
    machine_id: Uuid,
    slot_position: u32,
    snack_id: Uuid,
    price: Decimal,
    bought_at: Option<DateTime<Utc>>,
    bought_by: Option<Uuid>,
}

impl Default for Purchase {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            version: 0,
            machine_id: Uuid::nil(),
            slot_position: 0,
            snack_id: Uuid::nil(),
            price: Decimal::ZERO,
            bought_at: None,
            bought_by: None,
        }
    }
}

impl Purchase {
    pub fn machine_id(&self) -> Uuid {
        self.machine_id
    }

    pub fn slot_position(&self) -> u32 {
        self.slot_position
    }

    pub fn snack_id(&self) -> Uuid {
        self.snack_id
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn bought_at(&self) -> Option<DateTime<Utc>> {
        self.bought_at
    }

    pub fn bought_by(&self) -> Option<Uuid> {
        self.bought_by
    }
}

impl Aggregate for Purchase {
    type Event = PurchaseEvent;
    type Command = PurchaseCommand;
    type Id = Uuid;

    fn aggregate_type() -> &'static str {
        "purchase"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn handle(
        &self,
        command: PurchaseCommand,
        ctx: &OperationContext,
    ) -> Result<Vec<PurchaseEvent>, Vec<DomainError>> {
        match command {
            PurchaseCommand::Initialize {
                purchase_id,
                machine_id,
                slot_position,
                snack_id,
                price,
                bought_at,
            } => {
                let mut reasons = Vec::new();
                if self.is_initialized() {
                    reasons.push(DomainError::AlreadyInitialized);
                }
                if price.is_sign_negative() {
                    reasons.push(DomainError::NegativePrice(price));
                }
                if !reasons.is_empty() {
                    return Err(reasons);
                }
                Ok(vec![PurchaseEvent::PurchaseRecorded {
                    purchase_id,
                    machine_id,
                    slot_position,
                    snack_id,
                    price,
                    bought_at,
                    bought_by: ctx.actor_id,
                }])
            }
        }
    }

    fn apply(mut self, event: PurchaseEvent) -> Self {
        match event {
            PurchaseEvent::PurchaseRecorded {
                purchase_id,
                machine_id,
                slot_position,
                snack_id,
                price,
                bought_at,
                bought_by,
            } => {
                self.id = purchase_id;
                self.machine_id = machine_id;
                self.slot_position = slot_position;
                self.snack_id = snack_id;
                self.price = price;
                self.bought_at = Some(bought_at);
                self.bought_by = bought_by;
            }
        }

        self.version += 1;
        self
    }
}
