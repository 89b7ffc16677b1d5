//! Command Handlers module
//!
//! Orchestration of operations that span more than one aggregate. Each
//! handler coordinates runtimes; single-aggregate commands go straight
//! through the runtime and need no handler.

mod commands;
mod sale_handler;

pub use commands::{BuySnackCommand, SaleReceipt};
pub use sale_handler::SaleHandler;
