//! Domain module
//!
//! Core domain types and business logic.

pub mod context;
pub mod error;
pub mod events;
pub mod money;
pub mod slot;

pub use context::OperationContext;
pub use error::{DomainError, Rejection};
pub use events::{DomainEvent, MachineEvent, PurchaseEvent, SaleEvent, SnackEvent};
pub use money::{Denomination, Money, MoneyError};
pub use slot::{Slot, SnackPile, SnackPileError};
