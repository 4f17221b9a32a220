//! Split percentages
//!
//! A percentage is a decimal in [0, 100]. Party splits of an agreement are
//! percentages and their sum may never exceed 100; activation requires the
//! sum to close at exactly 100.

use crate::{Money, PactumError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A percentage in [0, 100]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percentage {
    value: Decimal,
}

impl Percentage {
    /// 0%
    pub const ZERO: Self = Self {
        value: Decimal::ZERO,
    };

    /// 100%
    pub const FULL: Self = Self {
        value: Decimal::ONE_HUNDRED,
    };

    /// Create a percentage; values outside [0, 100] are rejected
    pub fn new(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() || value > Decimal::ONE_HUNDRED {
            return Err(PactumError::PercentageOutOfRange {
                value: value.to_string(),
            });
        }
        Ok(Self { value })
    }

    /// The decimal value
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Whether this is exactly 100%
    pub fn is_full(&self) -> bool {
        self.value == Decimal::ONE_HUNDRED
    }

    /// Addition; fails if the sum exceeds 100
    pub fn add(self, other: Self) -> Result<Self> {
        Self::new(self.value + other.value)
    }

    /// Subtraction; fails if the result would be negative
    pub fn subtract(self, other: Self) -> Result<Self> {
        if other.value > self.value {
            return Err(PactumError::PercentageOutOfRange {
                value: (self.value - other.value).to_string(),
            });
        }
        Ok(Self {
            value: self.value - other.value,
        })
    }

    /// Derive this percentage's share of a total
    pub fn of(&self, total: Money) -> Result<Money> {
        let share = total
            .amount()
            .checked_mul(self.value)
            .ok_or(PactumError::AmountOverflow)?
            / Decimal::ONE_HUNDRED;
        Ok(Money::from_raw(share, total.currency()))
    }
}

impl TryFrom<Decimal> for Percentage {
    type Error = PactumError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Percentage> for Decimal {
    fn from(p: Percentage) -> Self {
        p.value
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.value)
    }
}
