//! Money type
//!
//! Domain primitive for the cash held by a machine, tracked as a count per
//! denomination. The amount is always derived from the counts, so an amount
//! that the physical denominations cannot represent cannot exist.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cash denomination, valued in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Denomination {
    One,
    Two,
    Five,
    Ten,
    Twenty,
    Fifty,
    Hundred,
}

impl Denomination {
    /// All denominations, largest first (the allocation order).
    pub const DESCENDING: [Denomination; 7] = [
        Denomination::Hundred,
        Denomination::Fifty,
        Denomination::Twenty,
        Denomination::Ten,
        Denomination::Five,
        Denomination::Two,
        Denomination::One,
    ];

    /// Face value in whole currency units.
    pub fn value(&self) -> i64 {
        match self {
            Denomination::One => 1,
            Denomination::Two => 2,
            Denomination::Five => 5,
            Denomination::Ten => 10,
            Denomination::Twenty => 20,
            Denomination::Fifty => 50,
            Denomination::Hundred => 100,
        }
    }
}

/// Errors that can occur combining Money values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Money count overflow for denomination {0:?}")]
    Overflow(Denomination),

    #[error("Insufficient count for denomination {0:?}")]
    InsufficientCount(Denomination),
}

/// Money represents a set of physical denomination counts.
///
/// # Invariants
/// - Counts are non-negative (`u32`)
/// - `amount()` equals the sum of count x face value and is therefore
///   always exactly representable by the counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Money {
    ones: u32,
    twos: u32,
    fives: u32,
    tens: u32,
    twenties: u32,
    fifties: u32,
    hundreds: u32,
}

impl Money {
    /// Create Money from explicit counts, smallest denomination first.
    pub fn new(
        ones: u32,
        twos: u32,
        fives: u32,
        tens: u32,
        twenties: u32,
        fifties: u32,
        hundreds: u32,
    ) -> Self {
        Self {
            ones,
            twos,
            fives,
            tens,
            twenties,
            fifties,
            hundreds,
        }
    }

    /// The empty cash set.
    pub fn none() -> Self {
        Self::default()
    }

    /// A single note or coin of the given denomination.
    pub fn single(denomination: Denomination) -> Self {
        let mut money = Self::none();
        *money.count_mut(denomination) = 1;
        money
    }

    /// Count held for one denomination.
    pub fn count(&self, denomination: Denomination) -> u32 {
        match denomination {
            Denomination::One => self.ones,
            Denomination::Two => self.twos,
            Denomination::Five => self.fives,
            Denomination::Ten => self.tens,
            Denomination::Twenty => self.twenties,
            Denomination::Fifty => self.fifties,
            Denomination::Hundred => self.hundreds,
        }
    }

    fn count_mut(&mut self, denomination: Denomination) -> &mut u32 {
        match denomination {
            Denomination::One => &mut self.ones,
            Denomination::Two => &mut self.twos,
            Denomination::Five => &mut self.fives,
            Denomination::Ten => &mut self.tens,
            Denomination::Twenty => &mut self.twenties,
            Denomination::Fifty => &mut self.fifties,
            Denomination::Hundred => &mut self.hundreds,
        }
    }

    /// Derived amount: sum of count x face value, in whole units.
    pub fn amount(&self) -> Decimal {
        let mut total: i64 = 0;
        for denomination in Denomination::DESCENDING {
            total += i64::from(self.count(denomination)) * denomination.value();
        }
        Decimal::from(total)
    }

    /// True when every count is zero.
    pub fn is_empty(&self) -> bool {
        *self == Self::none()
    }

    /// Combine two cash sets, failing on count overflow.
    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        let mut result = *self;
        for denomination in Denomination::DESCENDING {
            let sum = self
                .count(denomination)
                .checked_add(other.count(denomination))
                .ok_or(MoneyError::Overflow(denomination))?;
            *result.count_mut(denomination) = sum;
        }
        Ok(result)
    }

    /// Remove `other` from this cash set, failing if any count would go
    /// negative.
    pub fn subtract(&self, other: &Money) -> Result<Money, MoneyError> {
        let mut result = *self;
        for denomination in Denomination::DESCENDING {
            let remaining = self
                .count(denomination)
                .checked_sub(other.count(denomination))
                .ok_or(MoneyError::InsufficientCount(denomination))?;
            *result.count_mut(denomination) = remaining;
        }
        Ok(result)
    }

    /// Greedy change-making: pick denominations largest to smallest, taking
    /// `min(available, remaining / value)` of each.
    ///
    /// Returns `Some` only when the picked denominations sum to `amount`
    /// exactly. Because the available counts are bounded, the greedy pass
    /// can fail even when a non-greedy combination would succeed (e.g.
    /// amount 6 against {5:1, 2:3} fails although 2+2+2 exists). Callers
    /// treat `None` as "exact change not available".
    pub fn allocate(&self, amount: Decimal) -> Option<Money> {
        if amount.is_sign_negative() || !amount.fract().is_zero() {
            return None;
        }
        let mut remaining = amount.to_i64()?;
        let mut allocation = Money::none();

        for denomination in Denomination::DESCENDING {
            let value = denomination.value();
            let wanted = remaining / value;
            let taken = wanted.min(i64::from(self.count(denomination)));
            *allocation.count_mut(denomination) = taken as u32;
            remaining -= taken * value;
        }

        if remaining == 0 {
            Some(allocation)
        } else {
            None
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.amount())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_derived_from_counts() {
        let money = Money::new(1, 2, 3, 4, 0, 0, 1);
        // 1 + 4 + 15 + 40 + 100
        assert_eq!(money.amount(), dec!(160));
    }

    #[test]
    fn test_none_is_empty() {
        assert!(Money::none().is_empty());
        assert_eq!(Money::none().amount(), Decimal::ZERO);
    }

    #[test]
    fn test_single_denomination() {
        let note = Money::single(Denomination::Twenty);
        assert_eq!(note.count(Denomination::Twenty), 1);
        assert_eq!(note.amount(), dec!(20));
    }

    #[test]
    fn test_add() {
        let a = Money::new(1, 0, 1, 0, 0, 0, 0);
        let b = Money::new(2, 1, 0, 0, 0, 0, 0);
        let sum = a.add(&b).unwrap();
        assert_eq!(sum.count(Denomination::One), 3);
        assert_eq!(sum.count(Denomination::Two), 1);
        assert_eq!(sum.count(Denomination::Five), 1);
        assert_eq!(sum.amount(), dec!(10));
    }

    #[test]
    fn test_add_overflow() {
        let a = Money::new(u32::MAX, 0, 0, 0, 0, 0, 0);
        let b = Money::single(Denomination::One);
        assert_eq!(a.add(&b), Err(MoneyError::Overflow(Denomination::One)));
    }

    #[test]
    fn test_subtract() {
        let a = Money::new(3, 1, 1, 1, 0, 0, 0);
        let b = Money::new(1, 0, 1, 0, 0, 0, 0);
        let rest = a.subtract(&b).unwrap();
        assert_eq!(rest, Money::new(2, 1, 0, 1, 0, 0, 0));
    }

    #[test]
    fn test_subtract_insufficient() {
        let a = Money::single(Denomination::Five);
        let b = Money::single(Denomination::Ten);
        assert_eq!(
            a.subtract(&b),
            Err(MoneyError::InsufficientCount(Denomination::Ten))
        );
    }

    #[test]
    fn test_allocate_exact() {
        // amount 13 against {1:3, 2:1, 5:1, 10:1} => {10:1, 2:1, 1:1}
        let available = Money::new(3, 1, 1, 1, 0, 0, 0);
        let allocation = available.allocate(dec!(13)).unwrap();
        assert_eq!(allocation, Money::new(1, 1, 0, 1, 0, 0, 0));
        assert_eq!(allocation.amount(), dec!(13));
    }

    #[test]
    fn test_allocate_infeasible() {
        // amount 3 against {2:1, 1:0} has no exact combination
        let available = Money::new(0, 1, 0, 0, 0, 0, 0);
        assert_eq!(available.allocate(dec!(3)), None);
    }

    #[test]
    fn test_allocate_greedy_misses_feasible_combination() {
        // Greedy takes the 5 first and strands remainder 1; 2+2+2 would
        // have worked. The bounded-count greedy pass is the contract.
        let available = Money::new(0, 3, 1, 0, 0, 0, 0);
        assert_eq!(available.allocate(dec!(6)), None);
    }

    #[test]
    fn test_allocate_zero() {
        let available = Money::new(1, 1, 1, 1, 1, 1, 1);
        assert_eq!(available.allocate(Decimal::ZERO), Some(Money::none()));
    }

    #[test]
    fn test_allocate_rejects_fractional_and_negative() {
        let available = Money::new(10, 0, 0, 0, 0, 0, 0);
        assert_eq!(available.allocate(dec!(1.5)), None);
        assert_eq!(available.allocate(dec!(-1)), None);
    }

    #[test]
    fn test_allocation_never_exceeds_available() {
        let available = Money::new(2, 0, 1, 0, 0, 0, 0);
        let allocation = available.allocate(dec!(7)).unwrap();
        assert!(available.subtract(&allocation).is_ok());
    }
}
