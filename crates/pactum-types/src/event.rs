//! Domain events
//!
//! Aggregates record events while they mutate; the application layer
//! dispatches them to the event channel after the aggregate has been
//! persisted, then drains the queue. Payloads are complete and
//! self-sufficient so downstream consumers (notifications, projections)
//! never have to re-load the aggregate.

use crate::{
    AgreementId, ApprovalTier, Currency, EscrowAccountId, MilestoneId, Money, PartyId,
    Percentage, TransactionId, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event recorded by an aggregate during a state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    // ========================================================================
    // Agreement lifecycle
    // ========================================================================

    /// A commission agreement was created in Draft
    AgreementCreated {
        agreement_id: AgreementId,
        owner_user_id: UserId,
        title: String,
        total_value: Money,
        occurred_at: DateTime<Utc>,
    },

    /// A party joined a draft agreement
    PartyAdded {
        agreement_id: AgreementId,
        party_id: PartyId,
        party_name: String,
        split: Percentage,
        occurred_at: DateTime<Utc>,
    },

    /// A party accepted the agreement terms
    PartyAccepted {
        agreement_id: AgreementId,
        party_id: PartyId,
        occurred_at: DateTime<Utc>,
    },

    /// A milestone was added to a draft agreement
    MilestoneAdded {
        agreement_id: AgreementId,
        milestone_id: MilestoneId,
        description: String,
        value: Money,
        due_date: DateTime<Utc>,
        occurred_at: DateTime<Utc>,
    },

    /// A milestone was marked completed
    MilestoneCompleted {
        agreement_id: AgreementId,
        milestone_id: MilestoneId,
        occurred_at: DateTime<Utc>,
    },

    /// A pending milestone slipped past its due date
    MilestoneOverdue {
        agreement_id: AgreementId,
        milestone_id: MilestoneId,
        due_date: DateTime<Utc>,
        occurred_at: DateTime<Utc>,
    },

    /// The agreement moved from Draft to Active
    AgreementActivated {
        agreement_id: AgreementId,
        occurred_at: DateTime<Utc>,
    },

    /// The agreement reached Completed
    AgreementCompleted {
        agreement_id: AgreementId,
        occurred_at: DateTime<Utc>,
    },

    /// The agreement was flagged as disputed
    AgreementDisputed {
        agreement_id: AgreementId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },

    /// The agreement was canceled
    AgreementCanceled {
        agreement_id: AgreementId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },

    // ========================================================================
    // Escrow ledger
    // ========================================================================

    /// An escrow account was opened for an agreement
    EscrowAccountCreated {
        escrow_account_id: EscrowAccountId,
        agreement_id: AgreementId,
        currency: Currency,
        occurred_at: DateTime<Utc>,
    },

    /// A deposit reached Completed and now counts toward the balance
    DepositReceived {
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        amount: Money,
        occurred_at: DateTime<Utc>,
    },

    /// A payout entered the ledger
    PayoutRequested {
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        party_id: Option<PartyId>,
        amount: Money,
        tier: ApprovalTier,
        occurred_at: DateTime<Utc>,
    },

    /// A pending payout was approved
    PayoutApproved {
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        approved_by: UserId,
        occurred_at: DateTime<Utc>,
    },

    /// A pending payout was rejected
    PayoutRejected {
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        rejected_by: UserId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },

    /// An approved payout settled through the payment gateway
    PayoutExecuted {
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        amount: Money,
        transfer_reference: Option<String>,
        occurred_at: DateTime<Utc>,
    },

    /// An approved payout failed at the payment gateway
    PayoutFailed {
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },

    /// Funds were returned to the escrow account
    RefundRecorded {
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        amount: Money,
        occurred_at: DateTime<Utc>,
    },

    /// A platform fee was charged against the escrow balance
    FeeCharged {
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        amount: Money,
        occurred_at: DateTime<Utc>,
    },

    /// A completed transaction was flagged as disputed
    TransactionDisputed {
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Stable event name for logging and routing
    pub fn name(&self) -> &'static str {
        match self {
            Self::AgreementCreated { .. } => "agreement.created",
            Self::PartyAdded { .. } => "agreement.party_added",
            Self::PartyAccepted { .. } => "agreement.party_accepted",
            Self::MilestoneAdded { .. } => "agreement.milestone_added",
            Self::MilestoneCompleted { .. } => "agreement.milestone_completed",
            Self::MilestoneOverdue { .. } => "agreement.milestone_overdue",
            Self::AgreementActivated { .. } => "agreement.activated",
            Self::AgreementCompleted { .. } => "agreement.completed",
            Self::AgreementDisputed { .. } => "agreement.disputed",
            Self::AgreementCanceled { .. } => "agreement.canceled",
            Self::EscrowAccountCreated { .. } => "escrow.account_created",
            Self::DepositReceived { .. } => "escrow.deposit_received",
            Self::PayoutRequested { .. } => "escrow.payout_requested",
            Self::PayoutApproved { .. } => "escrow.payout_approved",
            Self::PayoutRejected { .. } => "escrow.payout_rejected",
            Self::PayoutExecuted { .. } => "escrow.payout_executed",
            Self::PayoutFailed { .. } => "escrow.payout_failed",
            Self::RefundRecorded { .. } => "escrow.refund_recorded",
            Self::FeeCharged { .. } => "escrow.fee_charged",
            Self::TransactionDisputed { .. } => "escrow.transaction_disputed",
        }
    }

    /// When the transition happened
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::AgreementCreated { occurred_at, .. }
            | Self::PartyAdded { occurred_at, .. }
            | Self::PartyAccepted { occurred_at, .. }
            | Self::MilestoneAdded { occurred_at, .. }
            | Self::MilestoneCompleted { occurred_at, .. }
            | Self::MilestoneOverdue { occurred_at, .. }
            | Self::AgreementActivated { occurred_at, .. }
            | Self::AgreementCompleted { occurred_at, .. }
            | Self::AgreementDisputed { occurred_at, .. }
            | Self::AgreementCanceled { occurred_at, .. }
            | Self::EscrowAccountCreated { occurred_at, .. }
            | Self::DepositReceived { occurred_at, .. }
            | Self::PayoutRequested { occurred_at, .. }
            | Self::PayoutApproved { occurred_at, .. }
            | Self::PayoutRejected { occurred_at, .. }
            | Self::PayoutExecuted { occurred_at, .. }
            | Self::PayoutFailed { occurred_at, .. }
            | Self::RefundRecorded { occurred_at, .. }
            | Self::FeeCharged { occurred_at, .. }
            | Self::TransactionDisputed { occurred_at, .. } => *occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_event_names_are_namespaced() {
        let event = DomainEvent::AgreementActivated {
            agreement_id: AgreementId::new(),
            occurred_at: Utc::now(),
        };
        assert_eq!(event.name(), "agreement.activated");
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = DomainEvent::DepositReceived {
            escrow_account_id: EscrowAccountId::new(),
            transaction_id: TransactionId::new(),
            amount: Money::new(dec!(250), Currency::usd()).unwrap(),
            occurred_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"DepositReceived\""));
    }
}
