//! # Money Module
//!
//! Provides the `Money` type and the rounding helpers shared by checkout and
//! reporting.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Every amount is a whole number of cents (two-decimal fixed point).  │
//! │    Rounding happens once, at the point of computation, half up.        │
//! │    Totals are sums of already-rounded line values, never re-derived.   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use comptoir_core::money::Money;
//! use comptoir_core::types::TaxRate;
//!
//! let excl = Money::from_cents(1000);                 // 10.00
//! let incl = excl.apply_tax_rate(TaxRate::from_thousandths(55)); // 5.5%
//! assert_eq!(incl.cents(), 1055);
//!
//! let line = incl.multiply_quantity(3);
//! assert_eq!(line.to_string(), "31.65");
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::TaxRate;

/// Number of decimal places carried by currency amounts.
pub const CURRENCY_PLACES: u32 = 2;

// =============================================================================
// Rounding
// =============================================================================

/// Rounds a decimal to `places` decimal places, half away from zero.
///
/// This is the "round half up" rule applied at every monetary boundary:
/// `2.345 → 2.35`, `-2.345 → -2.35`, `2.344 → 2.34`.
///
/// ## Example
/// ```rust
/// use comptoir_core::money::round_half_up;
/// use rust_decimal::Decimal;
///
/// let value = Decimal::new(2345, 3); // 2.345
/// assert_eq!(round_half_up(value, 2), Decimal::new(235, 2));
/// ```
pub fn round_half_up(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// Integer division rounding half away from zero. `denominator` must be > 0.
fn div_round_half_up(numerator: i128, denominator: i128) -> i128 {
    let magnitude = (2 * numerator.abs() + denominator) / (2 * denominator);
    if numerator < 0 {
        -magnitude
    } else {
        magnitude
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents (the smallest currency unit).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for corrections
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Serialized as the raw cent count**: the web layer formats for display
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Article.price_excl/incl ──► line_excl / line_incl ──► invoice totals   │
/// │                                                                         │
/// │  invoice totals ──► report sums ──► average basket, trends              │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ```rust
    /// use comptoir_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Converts a decimal amount in currency units to cents, rounding half up.
    ///
    /// Returns `None` when the amount does not fit in an `i64` cent count.
    ///
    /// ```rust
    /// use comptoir_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let money = Money::from_decimal(Decimal::new(10995, 3)).unwrap(); // 10.995
    /// assert_eq!(money.cents(), 1100);
    /// ```
    pub fn from_decimal(amount: Decimal) -> Option<Self> {
        let cents = round_half_up(amount, CURRENCY_PLACES) * Decimal::ONE_HUNDRED;
        cents.to_i64().map(Money)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the amount as an exact decimal in currency units.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, CURRENCY_PLACES)
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity. Exact: no rounding is involved.
    ///
    /// ## User Workflow
    /// ```text
    /// Article: Riz 5kg, 11.00 incl. tax
    /// Quantity: 2
    ///      │
    ///      ▼
    /// multiply_quantity(2) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Line total: 22.00
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Multiplies by a quantity, returning `None` when the product does
    /// not fit in cents.
    ///
    /// ```rust
    /// use comptoir_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(250).checked_multiply_quantity(4), Some(Money::from_cents(1000)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_multiply_quantity(2), None);
    /// ```
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Returns the tax-inclusive amount for this tax-exclusive amount.
    ///
    /// `incl = round_half_up(excl × (1 + rate), 2)`, computed in integer
    /// thousandths so no intermediate value is ever approximated.
    ///
    /// ```rust
    /// use comptoir_core::money::Money;
    /// use comptoir_core::types::TaxRate;
    ///
    /// // 9.99 at 18% = 11.7882 → 11.79
    /// let incl = Money::from_cents(999).apply_tax_rate(TaxRate::from_thousandths(180));
    /// assert_eq!(incl.cents(), 1179);
    /// ```
    pub fn apply_tax_rate(&self, rate: TaxRate) -> Money {
        let scaled = self.0 as i128 * (TaxRate::SCALE + rate.thousandths() as i128);
        Money(div_round_half_up(scaled, TaxRate::SCALE) as i64)
    }

    /// Divides a total evenly across `count` parts, rounding half up.
    ///
    /// Returns zero when `count` is zero instead of dividing by zero; this is
    /// what the average basket of an empty period reports.
    ///
    /// ```rust
    /// use comptoir_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1000).average_over(3).cents(), 333);
    /// assert_eq!(Money::from_cents(2000).average_over(3).cents(), 667);
    /// assert!(Money::from_cents(2000).average_over(0).is_zero());
    /// ```
    pub fn average_over(&self, count: i64) -> Money {
        if count <= 0 {
            return Money::zero();
        }
        Money(div_round_half_up(self.0 as i128, count as i128) as i64)
    }
}

/// Display renders the bare amount with two decimals (`12.50`, `-3.05`).
///
/// Currency symbols and separators belong to the presentation layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Parses a decimal amount such as `"10.99"` or `"1500"`.
///
/// More than two decimals are rounded half up.
impl FromStr for Money {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let decimal = Decimal::from_str(s.trim()).map_err(|_| invalid("not a decimal number"))?;
        Money::from_decimal(decimal).ok_or_else(|| invalid("amount out of range"))
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-305).to_string(), "-3.05");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_parse() {
        assert_eq!("10.99".parse::<Money>().unwrap().cents(), 1099);
        assert_eq!(" 1500 ".parse::<Money>().unwrap().cents(), 150000);
        assert_eq!("0.005".parse::<Money>().unwrap().cents(), 1);
        assert_eq!("-0.005".parse::<Money>().unwrap().cents(), -1);
        assert!("ten".parse::<Money>().is_err());
    }

    #[test]
    fn test_round_half_up_at_midpoint() {
        assert_eq!(round_half_up(Decimal::new(125, 3), 2), Decimal::new(13, 2));
        assert_eq!(round_half_up(Decimal::new(-125, 3), 2), Decimal::new(-13, 2));
        assert_eq!(round_half_up(Decimal::new(124, 3), 2), Decimal::new(12, 2));
        // Bankers rounding would give 0.2 here
        assert_eq!(round_half_up(Decimal::new(25, 2), 1), Decimal::new(3, 1));
    }

    #[test]
    fn test_apply_tax_rate() {
        let excl = Money::from_cents(1000);
        assert_eq!(excl.apply_tax_rate(TaxRate::from_thousandths(100)).cents(), 1100);
        assert_eq!(excl.apply_tax_rate(TaxRate::zero()).cents(), 1000);

        // 0.10 at 5.5% = 0.1055 → 0.11 (half up)
        let small = Money::from_cents(10);
        assert_eq!(small.apply_tax_rate(TaxRate::from_thousandths(55)).cents(), 11);

        // 0.30 at 5% = 0.315 → 0.32 (exact midpoint rounds up)
        let mid = Money::from_cents(30);
        assert_eq!(mid.apply_tax_rate(TaxRate::from_thousandths(50)).cents(), 32);
    }

    #[test]
    fn test_multiply_and_sum() {
        let lines = [
            Money::from_cents(1100).multiply_quantity(2),
            Money::from_cents(550).multiply_quantity(1),
        ];
        let total: Money = lines.iter().copied().sum();
        assert_eq!(total.cents(), 2750);
        assert_eq!((Money::from_cents(299) * 3).cents(), 897);
    }

    #[test]
    fn test_checked_multiply_large_quantities() {
        let unit = Money::from_cents(528);
        assert_eq!(unit.checked_multiply_quantity(10_000).map(|m| m.cents()), Some(5_280_000));
        assert_eq!(unit.checked_multiply_quantity(i64::MAX / 2), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
        assert_eq!(Money::from_cents(1).checked_add(Money::from_cents(2)), Some(Money::from_cents(3)));
    }

    #[test]
    fn test_average_over() {
        assert_eq!(Money::from_cents(10000).average_over(1).cents(), 10000);
        assert_eq!(Money::from_cents(1).average_over(2).cents(), 1);
        assert_eq!(Money::from_cents(-1).average_over(2).cents(), -1);
        assert!(Money::from_cents(500).average_over(0).is_zero());
    }

    #[test]
    fn test_decimal_round_trip_is_exact() {
        let money = Money::from_cents(-123456);
        assert_eq!(money.to_decimal(), Decimal::new(-123456, 2));
        assert_eq!(Money::from_decimal(money.to_decimal()), Some(money));
    }
}
