//! Idempotency keys for money-moving requests
//!
//! Every deposit, payout, refund and fee request carries a caller-chosen
//! key. Replaying a request with the same key returns the original
//! transaction instead of producing a second monetary effect.

use crate::{PactumError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum accepted key length after trimming
pub const MIN_IDEMPOTENCY_KEY_LENGTH: usize = 8;

/// An opaque client-supplied retry token with structural equality
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Create a key; short or blank keys are rejected
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.len() < MIN_IDEMPOTENCY_KEY_LENGTH {
            return Err(PactumError::IdempotencyKeyTooShort {
                min: MIN_IDEMPOTENCY_KEY_LENGTH,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = PactumError;

    fn try_from(key: String) -> Result<Self> {
        Self::new(key)
    }
}

impl From<IdempotencyKey> for String {
    fn from(key: IdempotencyKey) -> Self {
        key.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_minimum_length() {
        assert!(IdempotencyKey::new("short").is_err());
        assert!(IdempotencyKey::new("        ").is_err());
        assert!(IdempotencyKey::new("dep-2024-0001").is_ok());
    }

    #[test]
    fn test_key_structural_equality() {
        let a = IdempotencyKey::new("payout-req-42").unwrap();
        let b = IdempotencyKey::new("payout-req-42").unwrap();
        let c = IdempotencyKey::new("payout-req-43").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_key_trims_whitespace() {
        let a = IdempotencyKey::new("  payout-req-42  ").unwrap();
        assert_eq!(a.as_str(), "payout-req-42");
    }
}
