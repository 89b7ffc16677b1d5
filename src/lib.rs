//! snackFleet Library
//!
//! Event-sourced vending machine fleet core: per-id virtual-actor
//! execution, aggregate state machines, an append-only event log, a
//! committed-event stream, and eventually consistent projections.

pub mod aggregate;
pub mod config;
pub mod domain;
pub mod event_store;
pub mod fleet;
pub mod handlers;
pub mod jobs;
pub mod projection;
pub mod runtime;
pub mod stream;

mod error;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use fleet::SnackFleet;

pub use aggregate::{
    Aggregate, MachineCommand, Purchase, PurchaseCommand, SaleCommand, SaleMarker, Snack,
    SnackCommand, SnackMachine,
};
pub use domain::{
    Denomination, DomainError, MachineEvent, Money, OperationContext, PurchaseEvent, Rejection,
    SaleEvent, Slot, SnackEvent, SnackPile,
};
pub use handlers::{BuySnackCommand, SaleReceipt};
