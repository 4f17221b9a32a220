//! Escrow account and transaction lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an escrow account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowAccountStatus {
    /// Open for deposits, payouts and fees
    Active,
    /// Administratively frozen; refunds may still flow
    Suspended,
    /// Archived with its agreement; no further money movement
    Closed,
}

impl EscrowAccountStatus {
    /// Whether new deposits, payouts and fees may be registered
    pub fn can_transact(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for EscrowAccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "Active",
            Self::Suspended => "Suspended",
            Self::Closed => "Closed",
        };
        write!(f, "{}", s)
    }
}

/// Status of a ledger transaction
///
/// Allowed moves: `Pending -> Approved | Rejected` (payouts),
/// `Pending -> Completed` (deposit confirmation),
/// `Approved -> Completed | Failed`, `Completed -> Disputed`.
/// Everything else is rejected by the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Registered, awaiting approval or external confirmation
    Pending,
    /// Cleared for execution; already committed against the balance
    Approved,
    /// Declined by an approver
    Rejected,
    /// Money moved
    Completed,
    /// Execution failed at the gateway after approval
    Failed,
    /// Completed but contested; the flag never reverses funds by itself
    Disputed,
}

impl TransactionStatus {
    /// No transition leaves this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Failed | Self::Disputed)
    }

    /// Whether the monetary effect has settled
    ///
    /// A dispute flags a settled transaction; reversal takes an explicit
    /// refund entry, so Disputed still counts in the fold.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Completed | Self::Disputed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Disputed => "Disputed",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(TransactionStatus::Rejected.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Disputed.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(!TransactionStatus::Approved.is_terminal());
        assert!(!TransactionStatus::Completed.is_terminal());
    }

    #[test]
    fn test_settled_statuses() {
        assert!(TransactionStatus::Completed.is_settled());
        assert!(TransactionStatus::Disputed.is_settled());
        assert!(!TransactionStatus::Approved.is_settled());
    }
}
