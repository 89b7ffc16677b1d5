//! Projection module
//!
//! Read-optimized, eventually consistent copies of aggregate state. Rows
//! are derived caches: one version behind is tolerated, permanent
//! divergence is repaired by the synchronizer's catch-up passes.

mod store;
mod synchronizer;

pub use store::{MachineInfo, ProjectionStore, PurchaseInfo, SlotInfo, SnackInfo};
pub use synchronizer::{ProjectionError, ProjectionSynchronizer};
