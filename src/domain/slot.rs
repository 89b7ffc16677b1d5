//! Slot and SnackPile types
//!
//! A machine owns a set of slots, each at a unique position; a slot may
//! hold a pile of one snack at one price. Both are validated at
//! construction so an invalid pile cannot exist in the system.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors that can occur when creating a SnackPile
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnackPileError {
    #[error("Price must not be negative (got {0})")]
    NegativePrice(Decimal),

    #[error("Price must be a whole multiple of the smallest currency unit (got {0})")]
    FractionalPrice(Decimal),
}

/// A quantity of one snack at one unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnackPile {
    snack_id: Uuid,
    quantity: u32,
    price: Decimal,
}

impl SnackPile {
    /// Create a pile with validation.
    ///
    /// # Errors
    /// - `SnackPileError::NegativePrice` if price < 0
    /// - `SnackPileError::FractionalPrice` if price is not a whole number
    ///   of currency units
    pub fn new(snack_id: Uuid, quantity: u32, price: Decimal) -> Result<Self, SnackPileError> {
        if price.is_sign_negative() {
            return Err(SnackPileError::NegativePrice(price));
        }
        if !price.fract().is_zero() {
            return Err(SnackPileError::FractionalPrice(price));
        }
        Ok(Self {
            snack_id,
            quantity,
            price,
        })
    }

    pub fn snack_id(&self) -> Uuid {
        self.snack_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    /// Derived total: quantity x unit price.
    pub fn total_price(&self) -> Decimal {
        Decimal::from(self.quantity) * self.price
    }

    pub fn has_stock(&self) -> bool {
        self.quantity > 0
    }

    /// The pile after one snack is taken. Quantity must be >= 1; the
    /// aggregate guard checks stock before calling this.
    pub fn subtract_one(&self) -> SnackPile {
        SnackPile {
            snack_id: self.snack_id,
            quantity: self.quantity.saturating_sub(1),
            price: self.price,
        }
    }
}

/// One slot of a machine: a position plus an optional pile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    position: u32,
    pile: Option<SnackPile>,
}

impl Slot {
    pub fn empty(position: u32) -> Self {
        Self {
            position,
            pile: None,
        }
    }

    pub fn with_pile(position: u32, pile: SnackPile) -> Self {
        Self {
            position,
            pile: Some(pile),
        }
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn pile(&self) -> Option<&SnackPile> {
        self.pile.as_ref()
    }

    pub fn set_pile(&mut self, pile: SnackPile) {
        self.pile = Some(pile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pile_valid() {
        let pile = SnackPile::new(Uuid::new_v4(), 10, dec!(3)).unwrap();
        assert_eq!(pile.quantity(), 10);
        assert_eq!(pile.price(), dec!(3));
        assert_eq!(pile.total_price(), dec!(30));
        assert!(pile.has_stock());
    }

    #[test]
    fn test_pile_zero_quantity_allowed() {
        let pile = SnackPile::new(Uuid::new_v4(), 0, dec!(1)).unwrap();
        assert!(!pile.has_stock());
        assert_eq!(pile.total_price(), Decimal::ZERO);
    }

    #[test]
    fn test_pile_free_snack_allowed() {
        let pile = SnackPile::new(Uuid::new_v4(), 1, Decimal::ZERO);
        assert!(pile.is_ok());
    }

    #[test]
    fn test_pile_negative_price_rejected() {
        let result = SnackPile::new(Uuid::new_v4(), 1, dec!(-1));
        assert!(matches!(result, Err(SnackPileError::NegativePrice(_))));
    }

    #[test]
    fn test_pile_fractional_price_rejected() {
        let result = SnackPile::new(Uuid::new_v4(), 1, dec!(1.5));
        assert!(matches!(result, Err(SnackPileError::FractionalPrice(_))));
    }

    #[test]
    fn test_subtract_one() {
        let pile = SnackPile::new(Uuid::new_v4(), 2, dec!(5)).unwrap();
        let pile = pile.subtract_one();
        assert_eq!(pile.quantity(), 1);
        let pile = pile.subtract_one();
        assert_eq!(pile.quantity(), 0);
        assert!(!pile.has_stock());
    }

    #[test]
    fn test_slot_upsert_pile() {
        let mut slot = Slot::empty(0);
        assert!(slot.pile().is_none());

        let pile = SnackPile::new(Uuid::new_v4(), 5, dec!(2)).unwrap();
        slot.set_pile(pile.clone());
        assert_eq!(slot.pile(), Some(&pile));
    }
}
