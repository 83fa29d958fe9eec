//! Money using decimal arithmetic.
//!
//! Checkout amounts are rupees held as [`Decimal`] so that totals computed
//! twice from the same inputs are always identical. Conversion to minor units
//! (paise) happens only at the payment processor boundary.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Mul};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// An amount in the store currency's standard unit (rupees, not paise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Whole-unit amount, e.g. `Money::from_units(80)` is ₹80.
    #[must_use]
    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// Amount from minor units (paise).
    #[must_use]
    pub fn from_minor_units(minor: i64) -> Self {
        Self(Decimal::new(minor, 2))
    }

    /// The underlying decimal.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Amount in minor units (paise), rounded half away from zero.
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn to_minor_units(&self) -> Option<i64> {
        self.0
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }

    /// Subtract, flooring the result at zero.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0.saturating_sub(other.0))
        }
    }

    /// Absolute value.
    #[must_use]
    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// The smaller of two amounts.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        if self.0 <= other.0 { self } else { other }
    }

    /// Whether the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

/// Saturates at the largest representable amount. Such a total cannot be
/// converted to minor units, so it is refused at the payment boundary.
impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

/// Saturating, like [`Add`].
impl Mul<u32> for Money {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self {
        Self(self.0.saturating_mul(Decimal::from(rhs)))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "₹{}", self.0.normalize())
    }
}

/// ISO 4217 currency codes accepted by the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
}

impl CurrencyCode {
    /// The ISO code as sent to external APIs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units_round_trip() {
        let money = Money::from_units(160);
        assert_eq!(money.to_minor_units(), Some(16_000));
        assert_eq!(Money::from_minor_units(16_000), money);
    }

    #[test]
    fn test_minor_units_rounds_fractional_paise() {
        let money = Money::new(Decimal::new(10_005, 3)); // 10.005
        assert_eq!(money.to_minor_units(), Some(1_001));
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let total = Money::from_units(200).saturating_sub(Money::from_units(500));
        assert_eq!(total, Money::ZERO);
    }

    #[test]
    fn test_sum_and_mul() {
        let total: Money = [Money::from_units(80) * 2, Money::from_units(270)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_units(430));
    }

    #[test]
    fn test_overflow_saturates() {
        let huge = Money::new(Decimal::MAX);
        assert_eq!(huge * 2, huge);
        assert_eq!(huge + Money::from_units(40), huge);
        assert_eq!(huge.to_minor_units(), None);
    }

    #[test]
    fn test_display_drops_trailing_zeros() {
        assert_eq!(Money::from_minor_units(16_000).to_string(), "₹160");
        assert_eq!(Money::new(Decimal::new(1_999, 2)).to_string(), "₹19.99");
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Money::from_units(40)).unwrap();
        assert_eq!(json, "\"40\"");
    }

    #[test]
    fn test_currency_code_display() {
        assert_eq!(CurrencyCode::default().to_string(), "INR");
    }
}
