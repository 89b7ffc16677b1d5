//! Sale Handler
//!
//! Orchestrates a complete sale: the BuySnack command on the machine, the
//! idempotency marker keyed by the buy attempt, and the write-once Purchase
//! record. Coordinates three aggregates; each commit is owned by its own
//! aggregate's worker.

use std::sync::Arc;
use uuid::Uuid;

use crate::aggregate::sale::sale_key;
use crate::aggregate::{
    MachineCommand, Purchase, PurchaseCommand, SaleCommand, SaleMarker, SnackMachine,
};
use crate::domain::{MachineEvent, OperationContext};
use crate::error::AppError;
use crate::runtime::Runtime;

use super::{BuySnackCommand, SaleReceipt};

/// Handler for completed sales
pub struct SaleHandler {
    machines: Arc<Runtime<SnackMachine>>,
    sales: Arc<Runtime<SaleMarker>>,
    purchases: Arc<Runtime<Purchase>>,
}

impl SaleHandler {
    pub fn new(
        machines: Arc<Runtime<SnackMachine>>,
        sales: Arc<Runtime<SaleMarker>>,
        purchases: Arc<Runtime<Purchase>>,
    ) -> Self {
        Self {
            machines,
            sales,
            purchases,
        }
    }

    /// Execute the buy command and finalize it into a purchase record.
    ///
    /// The machine command itself is not idempotent (a retry that reaches
    /// the machine buys again); the finalization is: one transaction id
    /// maps to exactly one Purchase, and a crash between the marker commit
    /// and the purchase commit heals on retry.
    pub async fn execute(
        &self,
        command: BuySnackCommand,
        ctx: &OperationContext,
    ) -> Result<SaleReceipt, AppError> {
        let outcome = self
            .machines
            .execute(
                &command.machine_id,
                MachineCommand::BuySnack {
                    position: command.position,
                },
                ctx,
            )
            .await?;

        let (snack_id, price, bought_at) = outcome
            .events
            .iter()
            .find_map(|event| match event {
                MachineEvent::SnackBought {
                    snack_id,
                    price,
                    bought_at,
                    ..
                } => Some((*snack_id, *price, *bought_at)),
                _ => None,
            })
            .ok_or_else(|| {
                AppError::Internal("accepted buy command committed no sale event".to_string())
            })?;

        // Finalize the attempt. The marker pins the purchase id, so a
        // retried finalize returns the original id instead of minting a
        // second purchase.
        let key = sale_key(command.machine_id, command.position, command.transaction_id);
        let candidate_purchase_id = Uuid::new_v4();
        let marker_outcome = self
            .sales
            .execute(
                &key,
                SaleCommand::Finalize {
                    sale_key: key.clone(),
                    purchase_id: candidate_purchase_id,
                },
                ctx,
            )
            .await?;

        let purchase_id = if marker_outcome.events.is_empty() {
            let marker = self.sales.query(&key).await?;
            marker.purchase_id().ok_or_else(|| {
                AppError::Internal("finalized marker lost its purchase id".to_string())
            })?
        } else {
            candidate_purchase_id
        };

        // Record the purchase unless a previous attempt already did. Also
        // repairs a crash that finalized the marker but never recorded.
        match self.purchases.query(&purchase_id).await {
            Ok(_) => {
                tracing::debug!(%purchase_id, "Purchase already recorded; retry was a no-op");
            }
            Err(AppError::NotFound(_)) => {
                self.purchases
                    .execute(
                        &purchase_id,
                        PurchaseCommand::Initialize {
                            purchase_id,
                            machine_id: command.machine_id,
                            slot_position: command.position,
                            snack_id,
                            price,
                            bought_at,
                        },
                        ctx,
                    )
                    .await?;
            }
            Err(e) => return Err(e),
        }

        Ok(SaleReceipt {
            purchase_id,
            machine_id: command.machine_id,
            position: command.position,
            snack_id,
            price,
            machine_version: outcome.version,
        })
    }
}
