//! Ledger transactions
//!
//! A transaction is an append-mostly ledger entry: amount, kind and identity
//! never change after creation, only status-related fields mutate, and only
//! through the aggregate root.

use crate::TransactionStatus;
use chrono::{DateTime, Utc};
use pactum_types::{
    ApprovalTier, EscrowAccountId, IdempotencyKey, Money, PartyId, TransactionId, UserId,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a ledger entry does to the money held in escrow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Money entering escrow from the paying side
    Deposit,
    /// Money leaving escrow toward a party
    Payout,
    /// Money returned into escrow after a reversal
    Refund,
    /// Platform fee charged against the balance
    Fee,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Deposit => "Deposit",
            Self::Payout => "Payout",
            Self::Refund => "Refund",
            Self::Fee => "Fee",
        };
        write!(f, "{}", s)
    }
}

/// A single entry in an escrow account's ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowTransaction {
    pub transaction_id: TransactionId,
    pub escrow_account_id: EscrowAccountId,
    /// Receiving party; set on payouts only
    pub party_id: Option<PartyId>,
    pub kind: TransactionType,
    pub amount: Money,
    pub description: Option<String>,
    pub status: TransactionStatus,
    /// Approval classification; set on payouts only
    pub approval_tier: Option<ApprovalTier>,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_by: Option<UserId>,
    pub rejection_reason: Option<String>,
    pub failure_reason: Option<String>,
    pub dispute_reason: Option<String>,
    /// External payment-intent reference (deposits)
    pub payment_reference: Option<String>,
    /// External transfer reference (payouts, refunds)
    pub transfer_reference: Option<String>,
    pub idempotency_key: IdempotencyKey,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EscrowTransaction {
    pub(crate) fn deposit(
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        amount: Money,
        description: Option<String>,
        status: TransactionStatus,
        payment_reference: Option<String>,
        idempotency_key: IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            escrow_account_id,
            party_id: None,
            kind: TransactionType::Deposit,
            amount,
            description,
            status,
            approval_tier: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejection_reason: None,
            failure_reason: None,
            dispute_reason: None,
            payment_reference,
            transfer_reference: None,
            idempotency_key,
            created_at: now,
            updated_at: now,
        }
    }

    /// Automatic-tier payouts are born Approved; everything else waits
    /// Pending for a human decision.
    pub(crate) fn payout(
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        party_id: Option<PartyId>,
        amount: Money,
        description: Option<String>,
        tier: ApprovalTier,
        idempotency_key: IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Self {
        let auto = tier.auto_approves();
        Self {
            transaction_id,
            escrow_account_id,
            party_id,
            kind: TransactionType::Payout,
            amount,
            description,
            status: if auto {
                TransactionStatus::Approved
            } else {
                TransactionStatus::Pending
            },
            approval_tier: Some(tier),
            approved_by: None,
            approved_at: if auto { Some(now) } else { None },
            rejected_by: None,
            rejection_reason: None,
            failure_reason: None,
            dispute_reason: None,
            payment_reference: None,
            transfer_reference: None,
            idempotency_key,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn refund(
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        amount: Money,
        description: Option<String>,
        transfer_reference: Option<String>,
        idempotency_key: IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            escrow_account_id,
            party_id: None,
            kind: TransactionType::Refund,
            amount,
            description,
            status: TransactionStatus::Completed,
            approval_tier: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejection_reason: None,
            failure_reason: None,
            dispute_reason: None,
            payment_reference: None,
            transfer_reference,
            idempotency_key,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn fee(
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        amount: Money,
        description: Option<String>,
        idempotency_key: IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            escrow_account_id,
            party_id: None,
            kind: TransactionType::Fee,
            amount,
            description,
            status: TransactionStatus::Completed,
            approval_tier: None,
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejection_reason: None,
            failure_reason: None,
            dispute_reason: None,
            payment_reference: None,
            transfer_reference: None,
            idempotency_key,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_deposit(&self) -> bool {
        self.kind == TransactionType::Deposit
    }

    pub fn is_payout(&self) -> bool {
        self.kind == TransactionType::Payout
    }

    /// Settled money flowing into escrow
    pub fn counts_as_credit(&self) -> bool {
        matches!(self.kind, TransactionType::Deposit | TransactionType::Refund)
            && self.status.is_settled()
    }

    /// Money committed out of escrow; approved payouts already count
    pub fn counts_as_debit(&self) -> bool {
        matches!(self.kind, TransactionType::Payout | TransactionType::Fee)
            && (self.status == TransactionStatus::Approved || self.status.is_settled())
    }

    /// Pending payouts hold their amount against availability
    pub fn reserves_balance(&self) -> bool {
        self.kind == TransactionType::Payout && self.status == TransactionStatus::Pending
    }

    /// A payout that has not yet reached a settled or failed end state
    pub fn is_outstanding_payout(&self) -> bool {
        self.kind == TransactionType::Payout
            && matches!(
                self.status,
                TransactionStatus::Pending | TransactionStatus::Approved
            )
    }
}
