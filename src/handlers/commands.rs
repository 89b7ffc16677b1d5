//! Command and result payloads for the sale flow.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_store::Version;

/// Buy one snack from a machine slot.
///
/// The transaction id is the idempotency correlator: retrying with the same
/// id can never record a second purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuySnackCommand {
    pub machine_id: Uuid,
    pub position: u32,
    pub transaction_id: Uuid,
}

impl BuySnackCommand {
    pub fn new(machine_id: Uuid, position: u32) -> Self {
        Self {
            machine_id,
            position,
            transaction_id: Uuid::new_v4(),
        }
    }

    /// Pin the transaction id (for retries of the same attempt).
    pub fn with_transaction_id(mut self, transaction_id: Uuid) -> Self {
        self.transaction_id = transaction_id;
        self
    }
}

/// Result of a completed sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub purchase_id: Uuid,
    pub machine_id: Uuid,
    pub position: u32,
    pub snack_id: Uuid,
    pub price: Decimal,
    pub machine_version: Version,
}
