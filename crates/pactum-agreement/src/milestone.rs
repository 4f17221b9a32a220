//! Agreement milestones
//!
//! Milestones stage the commissioned work. Their values are bounded by the
//! agreement total and each completed milestone can back a payout of at most
//! its own value.

use crate::MilestoneStatus;
use chrono::{DateTime, Utc};
use pactum_types::{AgreementId, MilestoneId, Money, TransactionId};
use serde::{Deserialize, Serialize};

/// Input for adding a milestone to a draft agreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMilestone {
    pub milestone_id: MilestoneId,
    pub description: String,
    pub value: Money,
    pub due_date: DateTime<Utc>,
}

impl NewMilestone {
    pub fn new(description: impl Into<String>, value: Money, due_date: DateTime<Utc>) -> Self {
        Self {
            milestone_id: MilestoneId::new(),
            description: description.into(),
            value,
            due_date,
        }
    }
}

/// A staged deliverable within an agreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub milestone_id: MilestoneId,
    pub agreement_id: AgreementId,
    pub description: String,
    pub value: Money,
    pub due_date: DateTime<Utc>,
    pub status: MilestoneStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completion_notes: Option<String>,
    /// The payout transaction that released this milestone's funds, if any
    pub released_payout_transaction_id: Option<TransactionId>,
}

impl Milestone {
    pub(crate) fn from_input(
        input: NewMilestone,
        agreement_id: AgreementId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            milestone_id: input.milestone_id,
            agreement_id,
            description: input.description,
            value: input.value,
            due_date: input.due_date,
            status: MilestoneStatus::Pending,
            created_at: now,
            completed_at: None,
            completion_notes: None,
            released_payout_transaction_id: None,
        }
    }

    /// Whether the milestone has been delivered
    pub fn is_completed(&self) -> bool {
        self.status == MilestoneStatus::Completed
    }

    /// Whether the milestone is undelivered and past due at `now`
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.status == MilestoneStatus::Pending && self.due_date < now
    }
}
