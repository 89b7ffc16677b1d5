//! Domain Error Types
//!
//! Business-rule violations returned by aggregate guards. Every error maps
//! to a stable numeric code so external callers can switch on rejections
//! without parsing messages.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejection reasons produced by aggregate guard predicates.
///
/// A rejected command returns one or more of these and changes nothing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// The aggregate has not been initialized yet
    #[error("Entity has not been initialized")]
    NotInitialized,

    /// Initialize issued against an already-created aggregate
    #[error("Entity is already initialized")]
    AlreadyInitialized,

    /// The aggregate was removed; removal is terminal
    #[error("Entity has been removed")]
    Removed,

    /// No slot exists at the given position
    #[error("No slot at position {0}")]
    SlotNotFound(u32),

    /// The slot exists but holds no pile
    #[error("Slot {0} holds no snacks")]
    SlotEmpty(u32),

    /// The pile at the slot has zero quantity
    #[error("Slot {0} is out of stock")]
    OutOfStock(u32),

    /// Not enough money inserted to cover the snack price
    #[error("Insufficient credit: price {price}, in transaction {in_transaction}")]
    InsufficientCredit {
        price: Decimal,
        in_transaction: Decimal,
    },

    /// Duplicate slot position in an Initialize command
    #[error("Duplicate slot position {0}")]
    DuplicateSlotPosition(u32),

    /// Snack name is empty or whitespace
    #[error("Name must not be empty")]
    EmptyName,

    /// Snack name exceeds the maximum length
    #[error("Name is too long: {length} chars (max {max})")]
    NameTooLong { length: usize, max: usize },

    /// Picture URL exceeds the maximum length
    #[error("Picture URL is too long: {length} chars (max {max})")]
    PictureUrlTooLong { length: usize, max: usize },

    /// Invalid money value (count overflow on add)
    #[error("Invalid money: {0}")]
    InvalidMoney(String),

    /// Purchase price must not be negative
    #[error("Negative price: {0}")]
    NegativePrice(Decimal),
}

impl DomainError {
    /// Stable numeric code for this rejection.
    pub fn code(&self) -> u16 {
        match self {
            DomainError::NotInitialized => 1001,
            DomainError::AlreadyInitialized => 1002,
            DomainError::Removed => 1003,
            DomainError::SlotNotFound(_) => 1101,
            DomainError::SlotEmpty(_) => 1102,
            DomainError::OutOfStock(_) => 1103,
            DomainError::InsufficientCredit { .. } => 1104,
            DomainError::DuplicateSlotPosition(_) => 1105,
            DomainError::InvalidMoney(_) => 1106,
            DomainError::EmptyName => 1201,
            DomainError::NameTooLong { .. } => 1202,
            DomainError::PictureUrlTooLong { .. } => 1203,
            DomainError::NegativePrice(_) => 1301,
        }
    }

    /// Check if this rejection is about the aggregate's lifecycle rather
    /// than the command's payload.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            DomainError::NotInitialized | DomainError::AlreadyInitialized | DomainError::Removed
        )
    }
}

/// Wire form of a rejection: numeric code plus human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: u16,
    pub reason: String,
}

impl From<&DomainError> for Rejection {
    fn from(error: &DomainError) -> Self {
        Self {
            code: error.code(),
            reason: error.to_string(),
        }
    }
}
