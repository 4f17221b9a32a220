//! Currency codes
//!
//! Pactum never converts between currencies. A currency is a 3-letter
//! uppercase code attached to every amount; operations that mix currencies
//! fail explicitly.

use crate::{PactumError, Result};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A 3-letter uppercase currency code (ISO 4217 style)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Currency([u8; 3]);

impl Currency {
    /// Parse and normalize a currency code
    ///
    /// Accepts exactly three ASCII letters and uppercases them.
    pub fn new(code: &str) -> Result<Self> {
        let trimmed = code.trim();
        if trimmed.len() != 3 || !trimmed.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(PactumError::InvalidCurrency {
                code: code.to_string(),
            });
        }
        let mut bytes = [0u8; 3];
        for (i, b) in trimmed.bytes().enumerate() {
            bytes[i] = b.to_ascii_uppercase();
        }
        Ok(Self(bytes))
    }

    /// US dollars
    pub const fn usd() -> Self {
        Self(*b"USD")
    }

    /// Euros
    pub const fn eur() -> Self {
        Self(*b"EUR")
    }

    /// The uppercase code
    pub fn code(&self) -> &str {
        // Always valid ASCII by construction
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Currency::new(&code).map_err(de::Error::custom)
    }
}
