//! Identity types for Pactum
//!
//! All identity types are strongly typed wrappers around UUIDs to prevent
//! accidental mixing of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Whether this is the nil UUID
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// Convert to prefixed string
            pub fn to_prefixed_string(&self) -> String {
                format!("{}_{}", $prefix, self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

// Aggregate identity types
define_id_type!(AgreementId, "agr", "Unique identifier for a commission agreement");
define_id_type!(EscrowAccountId, "esc", "Unique identifier for an escrow account");

// Child entity identity types
define_id_type!(PartyId, "party", "Unique identifier for an agreement party");
define_id_type!(MilestoneId, "ms", "Unique identifier for an agreement milestone");
define_id_type!(TransactionId, "txn", "Unique identifier for an escrow transaction");

// Actor identity types
define_id_type!(UserId, "user", "Unique identifier for a platform user");
define_id_type!(ContactId, "contact", "Unique identifier for a contact record");
define_id_type!(CompanyId, "co", "Unique identifier for a company record");
