//! Approval classification for payout requests
//!
//! Every payout request is classified against the agreement total before it
//! enters the ledger. The tier decides the status the payout is born with
//! and how much review it needs before execution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How much scrutiny a payout needs before execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalTier {
    /// Small relative to the agreement total; born pre-approved
    Automatic,
    /// Requires an explicit approval step
    Manual,
    /// Large relative to the agreement total; requires elevated review
    Escalated,
}

impl ApprovalTier {
    /// Whether a payout of this tier is created already approved
    pub fn auto_approves(&self) -> bool {
        matches!(self, Self::Automatic)
    }
}

impl fmt::Display for ApprovalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Automatic => "automatic",
            Self::Manual => "manual",
            Self::Escalated => "escalated",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_automatic_auto_approves() {
        assert!(ApprovalTier::Automatic.auto_approves());
        assert!(!ApprovalTier::Manual.auto_approves());
        assert!(!ApprovalTier::Escalated.auto_approves());
    }
}
