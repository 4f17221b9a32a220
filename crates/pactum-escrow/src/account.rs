//! The escrow account aggregate root
//!
//! Holds the transaction ledger for one agreement. Guards run before any
//! field changes; balance and availability are derived from the ledger on
//! every read, so there is nothing to drift.

use crate::{EscrowAccountStatus, EscrowTransaction, TransactionStatus, TransactionType};
use chrono::{DateTime, Utc};
use pactum_types::{
    AgreementId, ApprovalTier, Currency, DomainEvent, EscrowAccountId, IdempotencyKey, Money,
    PactumError, PartyId, Result, TransactionId, UserId,
};
use serde::{Deserialize, Serialize};

/// The money-holding ledger for one commission agreement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowAccount {
    escrow_account_id: EscrowAccountId,
    agreement_id: AgreementId,
    owner_user_id: UserId,
    currency: Currency,
    status: EscrowAccountStatus,
    /// External source account reference for outbound transfers
    payout_account_id: Option<String>,
    transactions: Vec<EscrowTransaction>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl EscrowAccount {
    /// Open a new account with an empty ledger
    pub fn create(
        escrow_account_id: EscrowAccountId,
        agreement_id: AgreementId,
        owner_user_id: UserId,
        currency: Currency,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if escrow_account_id.is_nil() {
            return Err(PactumError::invalid_identifier("escrow_account_id"));
        }
        if agreement_id.is_nil() {
            return Err(PactumError::invalid_identifier("agreement_id"));
        }
        if owner_user_id.is_nil() {
            return Err(PactumError::invalid_identifier("owner_user_id"));
        }

        let mut account = Self {
            escrow_account_id,
            agreement_id,
            owner_user_id,
            currency,
            status: EscrowAccountStatus::Active,
            payout_account_id: None,
            transactions: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
            events: Vec::new(),
        };
        account.record(DomainEvent::EscrowAccountCreated {
            escrow_account_id,
            agreement_id,
            currency,
            occurred_at: now,
        });
        Ok(account)
    }

    // ========================================================================
    // Deposits
    // ========================================================================

    /// Register an inbound deposit
    ///
    /// `status` may be Pending (awaiting external confirmation) or Completed
    /// (funds already settled). Replaying the same idempotency key returns
    /// the original entry and appends nothing.
    pub fn register_deposit(
        &mut self,
        transaction_id: TransactionId,
        amount: Money,
        description: Option<String>,
        status: TransactionStatus,
        payment_reference: Option<String>,
        idempotency_key: IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Result<&EscrowTransaction> {
        self.ensure_active()?;
        self.ensure_currency(amount)?;
        ensure_positive(amount, "deposit")?;
        if !matches!(
            status,
            TransactionStatus::Pending | TransactionStatus::Completed
        ) {
            return Err(PactumError::InvalidTransactionState {
                transaction_id: transaction_id.to_string(),
                from: status.to_string(),
                action: "register a deposit".to_string(),
            });
        }
        if let Some(idx) = self.position_by_key(&idempotency_key) {
            return Ok(&self.transactions[idx]);
        }
        self.ensure_new_transaction_id(&transaction_id)?;

        if status == TransactionStatus::Completed {
            self.record(DomainEvent::DepositReceived {
                escrow_account_id: self.escrow_account_id,
                transaction_id,
                amount,
                occurred_at: now,
            });
        }
        self.transactions.push(EscrowTransaction::deposit(
            self.escrow_account_id,
            transaction_id,
            amount,
            description,
            status,
            payment_reference,
            idempotency_key,
            now,
        ));
        self.touch(now);
        Ok(&self.transactions[self.transactions.len() - 1])
    }

    /// Settle a pending deposit after external confirmation
    ///
    /// Confirming an already-completed deposit is a no-op, so webhook
    /// redelivery is harmless.
    pub fn confirm_deposit(
        &mut self,
        transaction_id: TransactionId,
        payment_reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let escrow_account_id = self.escrow_account_id;
        let txn = self.kind_mut(&transaction_id, TransactionType::Deposit, "confirm")?;
        if txn.status == TransactionStatus::Completed {
            return Ok(());
        }
        if txn.status != TransactionStatus::Pending {
            return Err(PactumError::InvalidTransactionState {
                transaction_id: transaction_id.to_string(),
                from: txn.status.to_string(),
                action: "confirm".to_string(),
            });
        }
        txn.status = TransactionStatus::Completed;
        if payment_reference.is_some() {
            txn.payment_reference = payment_reference;
        }
        txn.updated_at = now;
        let amount = txn.amount;
        self.record(DomainEvent::DepositReceived {
            escrow_account_id,
            transaction_id,
            amount,
            occurred_at: now,
        });
        self.touch(now);
        Ok(())
    }

    // ========================================================================
    // Payouts
    // ========================================================================

    /// Register an outbound payout request
    ///
    /// Coverage against the available balance is re-checked here even though
    /// callers run the policy pre-check first. Automatic-tier payouts are
    /// born Approved.
    #[allow(clippy::too_many_arguments)]
    pub fn request_payout(
        &mut self,
        transaction_id: TransactionId,
        party_id: Option<PartyId>,
        amount: Money,
        description: Option<String>,
        tier: ApprovalTier,
        idempotency_key: IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Result<&EscrowTransaction> {
        self.ensure_active()?;
        self.ensure_currency(amount)?;
        ensure_positive(amount, "payout")?;
        if let Some(idx) = self.position_by_key(&idempotency_key) {
            return Ok(&self.transactions[idx]);
        }
        self.ensure_new_transaction_id(&transaction_id)?;
        self.ensure_covered(amount)?;

        self.record(DomainEvent::PayoutRequested {
            escrow_account_id: self.escrow_account_id,
            transaction_id,
            party_id,
            amount,
            tier,
            occurred_at: now,
        });
        self.transactions.push(EscrowTransaction::payout(
            self.escrow_account_id,
            transaction_id,
            party_id,
            amount,
            description,
            tier,
            idempotency_key,
            now,
        ));
        self.touch(now);
        Ok(&self.transactions[self.transactions.len() - 1])
    }

    /// Approve a pending payout
    pub fn approve_payout(
        &mut self,
        transaction_id: TransactionId,
        approved_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let escrow_account_id = self.escrow_account_id;
        let txn = self.kind_mut(&transaction_id, TransactionType::Payout, "approve")?;
        if txn.status != TransactionStatus::Pending {
            return Err(PactumError::InvalidTransactionState {
                transaction_id: transaction_id.to_string(),
                from: txn.status.to_string(),
                action: "approve".to_string(),
            });
        }
        txn.status = TransactionStatus::Approved;
        txn.approved_by = Some(approved_by);
        txn.approved_at = Some(now);
        txn.updated_at = now;
        self.record(DomainEvent::PayoutApproved {
            escrow_account_id,
            transaction_id,
            approved_by,
            occurred_at: now,
        });
        self.touch(now);
        Ok(())
    }

    /// Reject a pending payout, releasing its reservation
    pub fn reject_payout(
        &mut self,
        transaction_id: TransactionId,
        rejected_by: UserId,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(PactumError::blank_field("reason"));
        }
        let escrow_account_id = self.escrow_account_id;
        let txn = self.kind_mut(&transaction_id, TransactionType::Payout, "reject")?;
        if txn.status != TransactionStatus::Pending {
            return Err(PactumError::InvalidTransactionState {
                transaction_id: transaction_id.to_string(),
                from: txn.status.to_string(),
                action: "reject".to_string(),
            });
        }
        txn.status = TransactionStatus::Rejected;
        txn.rejected_by = Some(rejected_by);
        txn.rejection_reason = Some(reason.clone());
        txn.updated_at = now;
        self.record(DomainEvent::PayoutRejected {
            escrow_account_id,
            transaction_id,
            rejected_by,
            reason,
            occurred_at: now,
        });
        self.touch(now);
        Ok(())
    }

    /// Record a confirmed external transfer for an approved payout
    pub fn mark_payout_executed(
        &mut self,
        transaction_id: TransactionId,
        transfer_reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let escrow_account_id = self.escrow_account_id;
        let txn = self.kind_mut(&transaction_id, TransactionType::Payout, "execute")?;
        if txn.status != TransactionStatus::Approved {
            return Err(PactumError::InvalidTransactionState {
                transaction_id: transaction_id.to_string(),
                from: txn.status.to_string(),
                action: "execute".to_string(),
            });
        }
        txn.status = TransactionStatus::Completed;
        txn.transfer_reference = transfer_reference.clone();
        txn.updated_at = now;
        let amount = txn.amount;
        self.record(DomainEvent::PayoutExecuted {
            escrow_account_id,
            transaction_id,
            amount,
            transfer_reference,
            occurred_at: now,
        });
        self.touch(now);
        Ok(())
    }

    /// Record a gateway failure for an approved payout
    ///
    /// Failed payouts leave the fold, restoring the balance they had
    /// committed.
    pub fn mark_payout_failed(
        &mut self,
        transaction_id: TransactionId,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let reason = reason.into();
        let escrow_account_id = self.escrow_account_id;
        let txn = self.kind_mut(&transaction_id, TransactionType::Payout, "fail")?;
        if txn.status != TransactionStatus::Approved {
            return Err(PactumError::InvalidTransactionState {
                transaction_id: transaction_id.to_string(),
                from: txn.status.to_string(),
                action: "fail".to_string(),
            });
        }
        txn.status = TransactionStatus::Failed;
        txn.failure_reason = Some(reason.clone());
        txn.updated_at = now;
        self.record(DomainEvent::PayoutFailed {
            escrow_account_id,
            transaction_id,
            reason,
            occurred_at: now,
        });
        self.touch(now);
        Ok(())
    }

    // ========================================================================
    // Refunds & fees
    // ========================================================================

    /// Record money returned into escrow after a reversal
    ///
    /// Allowed while the account is Active or Suspended.
    pub fn register_refund(
        &mut self,
        transaction_id: TransactionId,
        amount: Money,
        description: Option<String>,
        transfer_reference: Option<String>,
        idempotency_key: IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Result<&EscrowTransaction> {
        self.ensure_not_closed()?;
        self.ensure_currency(amount)?;
        ensure_positive(amount, "refund")?;
        if let Some(idx) = self.position_by_key(&idempotency_key) {
            return Ok(&self.transactions[idx]);
        }
        self.ensure_new_transaction_id(&transaction_id)?;

        self.record(DomainEvent::RefundRecorded {
            escrow_account_id: self.escrow_account_id,
            transaction_id,
            amount,
            occurred_at: now,
        });
        self.transactions.push(EscrowTransaction::refund(
            self.escrow_account_id,
            transaction_id,
            amount,
            description,
            transfer_reference,
            idempotency_key,
            now,
        ));
        self.touch(now);
        Ok(&self.transactions[self.transactions.len() - 1])
    }

    /// Charge a platform fee against the balance
    pub fn charge_fee(
        &mut self,
        transaction_id: TransactionId,
        amount: Money,
        description: Option<String>,
        idempotency_key: IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Result<&EscrowTransaction> {
        self.ensure_active()?;
        self.ensure_currency(amount)?;
        ensure_positive(amount, "fee")?;
        if let Some(idx) = self.position_by_key(&idempotency_key) {
            return Ok(&self.transactions[idx]);
        }
        self.ensure_new_transaction_id(&transaction_id)?;
        self.ensure_covered(amount)?;

        self.record(DomainEvent::FeeCharged {
            escrow_account_id: self.escrow_account_id,
            transaction_id,
            amount,
            occurred_at: now,
        });
        self.transactions.push(EscrowTransaction::fee(
            self.escrow_account_id,
            transaction_id,
            amount,
            description,
            idempotency_key,
            now,
        ));
        self.touch(now);
        Ok(&self.transactions[self.transactions.len() - 1])
    }

    // ========================================================================
    // Disputes & account state
    // ========================================================================

    /// Flag a completed transaction as contested
    ///
    /// The flag never moves money; a reversal takes an explicit refund.
    pub fn mark_transaction_disputed(
        &mut self,
        transaction_id: TransactionId,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(PactumError::blank_field("reason"));
        }
        let escrow_account_id = self.escrow_account_id;
        let txn = self.transaction_mut(&transaction_id)?;
        if txn.status != TransactionStatus::Completed {
            return Err(PactumError::InvalidTransactionState {
                transaction_id: transaction_id.to_string(),
                from: txn.status.to_string(),
                action: "dispute".to_string(),
            });
        }
        txn.status = TransactionStatus::Disputed;
        txn.dispute_reason = Some(reason.clone());
        txn.updated_at = now;
        self.record(DomainEvent::TransactionDisputed {
            escrow_account_id,
            transaction_id,
            reason,
            occurred_at: now,
        });
        self.touch(now);
        Ok(())
    }

    /// Link the external source account for outbound transfers
    pub fn link_external_account(
        &mut self,
        account_ref: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let account_ref = account_ref.into();
        if account_ref.trim().is_empty() {
            return Err(PactumError::blank_field("payout_account_id"));
        }
        self.payout_account_id = Some(account_ref);
        self.touch(now);
        Ok(())
    }

    /// Freeze the account; suspending twice is a no-op
    pub fn suspend(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_closed() {
            return Err(self.not_active());
        }
        if self.status == EscrowAccountStatus::Suspended {
            return Ok(());
        }
        self.status = EscrowAccountStatus::Suspended;
        self.touch(now);
        Ok(())
    }

    /// Archive the account; closing twice is a no-op
    ///
    /// Callers check settlement (no outstanding payouts) before closing.
    pub fn close(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_closed() {
            return Ok(());
        }
        self.status = EscrowAccountStatus::Closed;
        self.touch(now);
        Ok(())
    }

    // ========================================================================
    // Balance
    // ========================================================================

    /// Current balance: settled credits minus committed debits
    ///
    /// Derived from the ledger on every call; saturates at zero.
    pub fn balance(&self) -> Money {
        let credits = self.sum(EscrowTransaction::counts_as_credit);
        let debits = self.sum(EscrowTransaction::counts_as_debit);
        credits
            .subtract(debits)
            .unwrap_or_else(|_| Money::zero(self.currency))
    }

    /// Balance minus pending payout reservations
    pub fn available_balance(&self) -> Money {
        let reserved = self.sum(EscrowTransaction::reserves_balance);
        self.balance()
            .subtract(reserved)
            .unwrap_or_else(|_| Money::zero(self.currency))
    }

    /// Payouts still pending or approved, blocking settlement
    pub fn outstanding_payouts(&self) -> impl Iterator<Item = &EscrowTransaction> + '_ {
        self.transactions
            .iter()
            .filter(|t| t.is_outstanding_payout())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn escrow_account_id(&self) -> EscrowAccountId {
        self.escrow_account_id
    }

    pub fn agreement_id(&self) -> AgreementId {
        self.agreement_id
    }

    pub fn owner_user_id(&self) -> UserId {
        self.owner_user_id
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn status(&self) -> EscrowAccountStatus {
        self.status
    }

    pub fn payout_account_id(&self) -> Option<&str> {
        self.payout_account_id.as_deref()
    }

    /// The ledger in insertion order
    pub fn transactions(&self) -> &[EscrowTransaction] {
        &self.transactions
    }

    pub fn transaction(&self, transaction_id: &TransactionId) -> Option<&EscrowTransaction> {
        self.transactions
            .iter()
            .find(|t| &t.transaction_id == transaction_id)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Reserved for repository implementations after a versioned write
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Events recorded since the last drain
    pub fn events(&self) -> &[DomainEvent] {
        &self.events
    }

    /// Drain the recorded events for dispatch
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ensure_active(&self) -> Result<()> {
        if !self.status.can_transact() {
            return Err(self.not_active());
        }
        Ok(())
    }

    fn ensure_not_closed(&self) -> Result<()> {
        if self.status.is_closed() {
            return Err(self.not_active());
        }
        Ok(())
    }

    fn not_active(&self) -> PactumError {
        PactumError::AccountNotActive {
            escrow_account_id: self.escrow_account_id.to_string(),
            status: self.status.to_string(),
        }
    }

    fn ensure_currency(&self, amount: Money) -> Result<()> {
        if amount.currency() != self.currency {
            return Err(PactumError::CurrencyMismatch {
                expected: self.currency.code().to_string(),
                actual: amount.currency().code().to_string(),
            });
        }
        Ok(())
    }

    fn ensure_covered(&self, amount: Money) -> Result<()> {
        let available = self.available_balance();
        if amount > available {
            return Err(PactumError::InsufficientEscrowBalance {
                escrow_account_id: self.escrow_account_id.to_string(),
                requested: amount.to_string(),
                available: available.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_new_transaction_id(&self, transaction_id: &TransactionId) -> Result<()> {
        if self.transaction(transaction_id).is_some() {
            return Err(PactumError::DuplicateTransaction {
                transaction_id: transaction_id.to_string(),
            });
        }
        Ok(())
    }

    fn position_by_key(&self, key: &IdempotencyKey) -> Option<usize> {
        self.transactions
            .iter()
            .position(|t| &t.idempotency_key == key)
    }

    fn transaction_mut(&mut self, transaction_id: &TransactionId) -> Result<&mut EscrowTransaction> {
        self.transactions
            .iter_mut()
            .find(|t| &t.transaction_id == transaction_id)
            .ok_or_else(|| PactumError::TransactionNotFound {
                transaction_id: transaction_id.to_string(),
            })
    }

    fn kind_mut(
        &mut self,
        transaction_id: &TransactionId,
        kind: TransactionType,
        action: &str,
    ) -> Result<&mut EscrowTransaction> {
        let txn = self.transaction_mut(transaction_id)?;
        if txn.kind != kind {
            return Err(PactumError::InvalidTransactionState {
                transaction_id: transaction_id.to_string(),
                from: format!("{} ({})", txn.status, txn.kind),
                action: action.to_string(),
            });
        }
        Ok(txn)
    }

    fn sum(&self, keep: impl Fn(&EscrowTransaction) -> bool) -> Money {
        self.transactions
            .iter()
            .filter(|t| keep(t))
            .fold(Money::zero(self.currency), |acc, t| {
                acc.add(t.amount).unwrap_or(acc)
            })
    }

    fn record(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

fn ensure_positive(amount: Money, what: &str) -> Result<()> {
    if !amount.is_positive() {
        return Err(PactumError::invalid_amount(format!(
            "{} amount must be positive",
            what
        )));
    }
    Ok(())
}
