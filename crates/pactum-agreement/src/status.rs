//! Agreement and milestone lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a commission agreement
///
/// `Draft -> Active -> Completed` is the happy path. `Canceled` is reachable
/// from any non-terminal state; `Disputed` flags a live disagreement and is
/// not terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgreementStatus {
    /// Being assembled: parties and milestones may still change
    Draft,
    /// Live: deposits and payouts may flow
    Active,
    /// All work done and settled
    Completed,
    /// A party raised a dispute
    Disputed,
    /// Abandoned before completion
    Canceled,
}

impl AgreementStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Canceled)
    }
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Draft => "Draft",
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Disputed => "Disputed",
            Self::Canceled => "Canceled",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle state of a milestone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MilestoneStatus {
    /// Work not yet delivered
    Pending,
    /// Delivered and acknowledged
    Completed,
    /// Pending past its due date
    Overdue,
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Overdue => "Overdue",
        };
        write!(f, "{}", s)
    }
}
