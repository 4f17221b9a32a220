//! Money with exact decimal arithmetic
//!
//! Amounts are non-negative `rust_decimal` values tagged with a currency.
//! All arithmetic goes through named fallible operations; there are no
//! panicking operator overloads. Subtraction that would go negative and
//! any cross-currency operation fail explicitly.

use crate::{Currency, PactumError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A non-negative amount of a single currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "MoneyParts")]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

#[derive(Deserialize)]
struct MoneyParts {
    amount: Decimal,
    currency: Currency,
}

impl TryFrom<MoneyParts> for Money {
    type Error = PactumError;

    fn try_from(parts: MoneyParts) -> Result<Self> {
        Self::new(parts.amount, parts.currency)
    }
}

impl Money {
    /// Create a new amount; negative values are rejected
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self> {
        if amount.is_sign_negative() {
            return Err(PactumError::NegativeAmount {
                amount: amount.to_string(),
            });
        }
        Ok(Self { amount, currency })
    }

    /// Create a zero amount
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// The decimal amount
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// The currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Check if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Check if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Addition (currencies must match)
    pub fn add(self, other: Self) -> Result<Self> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or(PactumError::AmountOverflow)?;
        Ok(Self {
            amount,
            currency: self.currency,
        })
    }

    /// Subtraction (currencies must match, result may not go negative)
    pub fn subtract(self, other: Self) -> Result<Self> {
        self.ensure_same_currency(other)?;
        if other.amount > self.amount {
            return Err(PactumError::AmountUnderflow);
        }
        Ok(Self {
            amount: self.amount - other.amount,
            currency: self.currency,
        })
    }

    /// Round to a number of decimal places (banker's rounding)
    pub fn round_dp(self, dp: u32) -> Self {
        Self {
            amount: self.amount.round_dp(dp),
            currency: self.currency,
        }
    }

    pub(crate) fn from_raw(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    fn ensure_same_currency(&self, other: Self) -> Result<()> {
        if self.currency != other.currency {
            return Err(PactumError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                actual: other.currency.code().to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

impl PartialOrd for Money {
    /// Amounts of different currencies are not comparable
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency != other.currency {
            return None;
        }
        self.amount.partial_cmp(&other.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd(v: Decimal) -> Money {
        Money::new(v, Currency::usd()).unwrap()
    }

    #[test]
    fn test_money_rejects_negative() {
        assert!(Money::new(dec!(-1), Currency::usd()).is_err());
        assert!(Money::new(dec!(0), Currency::usd()).is_ok());
    }

    #[test]
    fn test_money_arithmetic() {
        let a = usd(dec!(100));
        let b = usd(dec!(40.50));

        assert_eq!(a.add(b).unwrap(), usd(dec!(140.50)));
        assert_eq!(a.subtract(b).unwrap(), usd(dec!(59.50)));
    }

    #[test]
    fn test_money_subtraction_never_goes_negative() {
        let a = usd(dec!(10));
        let b = usd(dec!(20));
        assert!(matches!(a.subtract(b), Err(PactumError::AmountUnderflow)));
    }

    #[test]
    fn test_money_currency_mismatch() {
        let a = usd(dec!(10));
        let b = Money::new(dec!(10), Currency::eur()).unwrap();
        assert!(matches!(
            a.add(b),
            Err(PactumError::CurrencyMismatch { .. })
        ));
        assert!(a.partial_cmp(&b).is_none());
    }

    #[test]
    fn test_money_comparison() {
        let a = usd(dec!(100));
        let b = usd(dec!(50));
        assert!(a > b);
        assert!(b < a);
        assert_eq!(a, usd(dec!(100.00)));
    }

    #[test]
    fn test_money_deserialize_rejects_negative() {
        let result: std::result::Result<Money, _> =
            serde_json::from_str(r#"{"amount":"-5","currency":"USD"}"#);
        assert!(result.is_err());
    }
}
