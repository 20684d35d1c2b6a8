//! Monetary amounts with exact cent precision.

use core::fmt;
use std::iter::Sum;
use std::ops::Add;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Money`] value.
#[derive(thiserror::Error, Debug, Clone)]
pub enum MoneyError {
    /// The input is not a valid decimal number.
    #[error("not a valid amount")]
    Invalid,
    /// The amount is negative.
    #[error("amount cannot be negative")]
    Negative,
}

/// A monetary amount stored as an integer number of cents.
///
/// Storing cents avoids floating-point drift in totals and makes the value a
/// plain `INTEGER` column in the database. Conversion to [`Decimal`] is
/// provided for arithmetic that needs fractional intermediate values
/// (e.g. tax rates) and for display.
///
/// ## Examples
///
/// ```
/// use stockbook_core::Money;
///
/// let price = Money::parse("10.00").unwrap();
/// assert_eq!(price.cents(), 1000);
/// assert_eq!(price.to_string(), "$10.00");
///
/// let line = price.times(2);
/// assert_eq!(line.cents(), 2000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Create a `Money` from an integer number of cents.
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// The amount as integer cents.
    #[must_use]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// The amount as a two-decimal-place [`Decimal`].
    #[must_use]
    pub fn amount(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Parse a non-negative amount from a form-style decimal string.
    ///
    /// The input is trimmed and rounded to cent precision (half away from
    /// zero), matching a two-decimal-place money field.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Invalid`] if the input is not a decimal number,
    /// or [`MoneyError::Negative`] for negative amounts.
    pub fn parse(s: &str) -> Result<Self, MoneyError> {
        let amount: Decimal = s.trim().parse().map_err(|_| MoneyError::Invalid)?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        let cents = (amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or(MoneyError::Invalid)?;
        Ok(Self(cents))
    }

    /// Multiply by a whole quantity (line subtotal = unit price x quantity).
    #[must_use]
    pub const fn times(self, quantity: i64) -> Self {
        Self(self.0 * quantity)
    }

    /// A percentage of this amount, rounded to the nearest cent (half up).
    #[must_use]
    pub const fn percentage(self, percent: i64) -> Self {
        Self((self.0 * percent + 50) / 100)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.amount())
    }
}

// SQLx support (with sqlite feature): stored as INTEGER cents.
#[cfg(feature = "sqlite")]
impl sqlx::Type<sqlx::Sqlite> for Money {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

#[cfg(feature = "sqlite")]
impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for Money {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let cents = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(cents))
    }
}

#[cfg(feature = "sqlite")]
impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<'q, sqlx::Sqlite>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_amount() {
        assert_eq!(Money::parse("10.00").unwrap().cents(), 1000);
        assert_eq!(Money::parse("5").unwrap().cents(), 500);
        assert_eq!(Money::parse(" 0.99 ").unwrap().cents(), 99);
    }

    #[test]
    fn test_parse_rounds_to_cents() {
        // Half away from zero at the third decimal
        assert_eq!(Money::parse("1.005").unwrap().cents(), 101);
        assert_eq!(Money::parse("1.004").unwrap().cents(), 100);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Money::parse("abc"), Err(MoneyError::Invalid)));
        assert!(matches!(Money::parse(""), Err(MoneyError::Invalid)));
        assert!(matches!(Money::parse("1.2.3"), Err(MoneyError::Invalid)));
    }

    #[test]
    fn test_parse_rejects_negative() {
        assert!(matches!(Money::parse("-1.00"), Err(MoneyError::Negative)));
    }

    #[test]
    fn test_times() {
        assert_eq!(Money::from_cents(1000).times(2).cents(), 2000);
        assert_eq!(Money::from_cents(500).times(1).cents(), 500);
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // 12% of $25.00 = $3.00 exactly
        assert_eq!(Money::from_cents(2500).percentage(12).cents(), 300);
        // 12% of $0.10 = 1.2 cents, rounds to 1
        assert_eq!(Money::from_cents(10).percentage(12).cents(), 1);
        // 12% of $0.04 = 0.48 cents, rounds to 0
        assert_eq!(Money::from_cents(4).percentage(12).cents(), 0);
        // 12% of $1.04 = 12.48 cents -> 12; 12% of $1.05 = 12.6 -> 13
        assert_eq!(Money::from_cents(104).percentage(12).cents(), 12);
        assert_eq!(Money::from_cents(105).percentage(12).cents(), 13);
    }

    #[test]
    fn test_sum_and_add() {
        let total: Money = [Money::from_cents(2000), Money::from_cents(500)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_cents(2500));
        assert_eq!(total + Money::from_cents(300), Money::from_cents(2800));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1000).to_string(), "$10.00");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::ZERO.to_string(), "$0.00");
    }

    #[test]
    fn test_serde_as_cents() {
        let money = Money::from_cents(1234);
        let json = serde_json::to_string(&money).unwrap();
        assert_eq!(json, "1234");

        let parsed: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, money);
    }
}
