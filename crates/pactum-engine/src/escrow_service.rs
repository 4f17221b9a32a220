//! Escrow ledger commands
//!
//! Money enters through deposit intents, leaves through approved payouts,
//! and every move is a ledger row on the [`EscrowAccount`] aggregate.
//! Gateway ordering per command:
//!
//! - Inbound: the deposit intent is opened first; a gateway failure leaves
//!   the ledger unwritten.
//! - Outbound: the transfer runs against a payout already Approved in the
//!   ledger. An explicit failure status is recorded as Failed; a transport
//!   error leaves the payout Approved and surfaces a retriable error.

use crate::clock::Clock;
use crate::dispatch::EventDispatcher;
use crate::repository::{AgreementRepository, EscrowAccountRepository};
use pactum_escrow::{EscrowAccount, EscrowTransaction, TransactionStatus, TransactionType};
use pactum_gateway::{PaymentGateway, SplitTransfer, WebhookEvent};
use pactum_policy::PayoutPolicy;
use pactum_types::{
    DomainEvent, EscrowAccountId, IdempotencyKey, MilestoneId, Money, PactumError, PartyId,
    Result, TransactionId, UserId,
};
use std::sync::Arc;
use tracing::{info, warn};

/// A deposit opened against the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct DepositInitiation {
    /// The pending ledger row, keyed by the gateway payment reference
    pub transaction: EscrowTransaction,
    /// Handed to the paying client; a replayed request does not re-issue it
    pub client_secret: Option<String>,
}

/// Effect of a verified processor webhook on the ledger
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    DepositConfirmed(EscrowTransaction),
    PayoutSettled(EscrowTransaction),
    Ignored { event_type: String },
}

/// Normalized result of an outbound transfer attempt
struct TransferOutcome {
    status: String,
    settled: bool,
    failed: bool,
    reference: Option<String>,
    failure_reason: Option<String>,
}

/// Orchestrates the money side: deposits, payouts, refunds, and fees
pub struct EscrowService {
    agreements: Arc<dyn AgreementRepository>,
    escrow_accounts: Arc<dyn EscrowAccountRepository>,
    gateway: Arc<dyn PaymentGateway>,
    dispatcher: Arc<dyn EventDispatcher>,
    clock: Arc<dyn Clock>,
    policy: PayoutPolicy,
}

impl EscrowService {
    pub fn new(
        agreements: Arc<dyn AgreementRepository>,
        escrow_accounts: Arc<dyn EscrowAccountRepository>,
        gateway: Arc<dyn PaymentGateway>,
        dispatcher: Arc<dyn EventDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            agreements,
            escrow_accounts,
            gateway,
            dispatcher,
            clock,
            policy: PayoutPolicy::default(),
        }
    }

    /// Replace the default payout policy thresholds
    pub fn with_policy(mut self, policy: PayoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    // ========================================================================
    // Deposits
    // ========================================================================

    /// Open a deposit: a gateway payment intent plus a Pending ledger row
    ///
    /// The row completes when the processor confirms the charge (webhook or
    /// [`Self::confirm_deposit`]). Replaying the same idempotency key
    /// returns the original row without opening a second intent.
    pub async fn deposit(
        &self,
        acting_user: UserId,
        escrow_account_id: EscrowAccountId,
        amount: Money,
        description: Option<String>,
        idempotency_key: IdempotencyKey,
    ) -> Result<DepositInitiation> {
        let now = self.clock.now();
        let mut account = self.escrow_accounts.get(escrow_account_id).await?;
        ensure_account_owner(&account, acting_user)?;

        if let Some(existing) = account
            .transactions()
            .iter()
            .find(|t| t.idempotency_key == idempotency_key)
        {
            return Ok(DepositInitiation {
                transaction: existing.clone(),
                client_secret: None,
            });
        }
        // Fail before the gateway call opens an intent nobody can pay
        if !account.status().can_transact() {
            return Err(PactumError::AccountNotActive {
                escrow_account_id: escrow_account_id.to_string(),
                status: account.status().to_string(),
            });
        }

        let intent = self
            .gateway
            .create_escrow_deposit_intent(escrow_account_id, amount, description.as_deref())
            .await?;
        let transaction = account
            .register_deposit(
                TransactionId::new(),
                amount,
                description,
                TransactionStatus::Pending,
                Some(intent.payment_intent_id.clone()),
                idempotency_key,
                now,
            )?
            .clone();
        let stored = self.persist_new_row(account, &transaction).await?;

        info!(
            "Deposit {} of {} initiated on {} via intent {}",
            transaction.transaction_id,
            amount,
            stored.escrow_account_id(),
            intent.payment_intent_id
        );
        Ok(DepositInitiation {
            transaction,
            client_secret: Some(intent.client_secret),
        })
    }

    /// Settle a pending deposit into the balance
    pub async fn confirm_deposit(
        &self,
        acting_user: UserId,
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
    ) -> Result<EscrowTransaction> {
        let mut account = self.escrow_accounts.get(escrow_account_id).await?;
        ensure_account_owner(&account, acting_user)?;
        account.confirm_deposit(transaction_id, None, self.clock.now())?;
        let transaction = found_transaction(&account, transaction_id)?;
        self.persist(account).await?;

        info!(
            "Deposit {} confirmed on {}",
            transaction_id, escrow_account_id
        );
        Ok(transaction)
    }

    // ========================================================================
    // Payouts
    // ========================================================================

    /// Request a payout against the available balance
    ///
    /// The policy classifies the approval tier from the amount's share of
    /// the agreement total; an Automatic-tier payout is born Approved. A
    /// milestone-linked request additionally requires the milestone
    /// completed and the amount within its value.
    #[allow(clippy::too_many_arguments)]
    pub async fn request_payout(
        &self,
        acting_user: UserId,
        escrow_account_id: EscrowAccountId,
        party_id: Option<PartyId>,
        amount: Money,
        description: Option<String>,
        milestone_id: Option<MilestoneId>,
        idempotency_key: IdempotencyKey,
    ) -> Result<EscrowTransaction> {
        let now = self.clock.now();
        let mut account = self.escrow_accounts.get(escrow_account_id).await?;
        ensure_account_owner(&account, acting_user)?;
        let agreement = self.agreements.get(account.agreement_id()).await?;

        if let Some(party_id) = party_id {
            if agreement.party(&party_id).is_none() {
                return Err(PactumError::PartyNotFound {
                    party_id: party_id.to_string(),
                });
            }
        }
        if let Some(milestone_id) = milestone_id {
            let milestone = agreement.milestone(&milestone_id).ok_or_else(|| {
                PactumError::MilestoneNotFound {
                    milestone_id: milestone_id.to_string(),
                }
            })?;
            self.policy
                .ensure_milestone_eligible_for_payout(&agreement, milestone, amount)?;
        }
        self.policy.ensure_escrow_coverage(&account, amount)?;
        let tier = self.policy.determine_approval_tier(&agreement, amount)?;

        let transaction = account
            .request_payout(
                TransactionId::new(),
                party_id,
                amount,
                description,
                tier,
                idempotency_key,
                now,
            )?
            .clone();
        self.persist_new_row(account, &transaction).await?;

        info!(
            "Payout {} of {} requested on {} ({} tier)",
            transaction.transaction_id, amount, escrow_account_id, tier
        );
        Ok(transaction)
    }

    pub async fn approve_payout(
        &self,
        acting_user: UserId,
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
    ) -> Result<EscrowTransaction> {
        let mut account = self.escrow_accounts.get(escrow_account_id).await?;
        ensure_account_owner(&account, acting_user)?;
        account.approve_payout(transaction_id, acting_user, self.clock.now())?;
        let transaction = found_transaction(&account, transaction_id)?;
        self.persist(account).await?;

        info!(
            "Payout {} approved by {} on {}",
            transaction_id, acting_user, escrow_account_id
        );
        Ok(transaction)
    }

    pub async fn reject_payout(
        &self,
        acting_user: UserId,
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        reason: impl Into<String>,
    ) -> Result<EscrowTransaction> {
        let mut account = self.escrow_accounts.get(escrow_account_id).await?;
        ensure_account_owner(&account, acting_user)?;
        account.reject_payout(transaction_id, acting_user, reason, self.clock.now())?;
        let transaction = found_transaction(&account, transaction_id)?;
        self.persist(account).await?;

        info!(
            "Payout {} rejected on {}",
            transaction_id, escrow_account_id
        );
        Ok(transaction)
    }

    /// Transfer an approved payout out through the gateway
    ///
    /// A payout naming a party goes to that party's linked account; a payout
    /// without a party is split across all parties by their percentages.
    pub async fn execute_payout(
        &self,
        acting_user: UserId,
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
    ) -> Result<EscrowTransaction> {
        let now = self.clock.now();
        let mut account = self.escrow_accounts.get(escrow_account_id).await?;
        ensure_account_owner(&account, acting_user)?;
        let payout = found_transaction(&account, transaction_id)?;

        // The transfer moves real money, so the state check cannot wait for
        // the aggregate: only an Approved payout may reach the gateway
        if payout.kind != TransactionType::Payout
            || payout.status != TransactionStatus::Approved
        {
            return Err(PactumError::InvalidTransactionState {
                transaction_id: transaction_id.to_string(),
                from: format!("{} ({})", payout.status, payout.kind),
                action: "execute".to_string(),
            });
        }

        let outcome = match payout.party_id {
            Some(party_id) => {
                self.transfer_to_party(&account, &payout, party_id).await?
            }
            None => self.transfer_split(&account, &payout).await?,
        };

        if outcome.settled {
            account.mark_payout_executed(transaction_id, outcome.reference, now)?;
            info!(
                "Payout {} of {} executed on {}",
                transaction_id, payout.amount, escrow_account_id
            );
        } else if outcome.failed {
            let reason = outcome
                .failure_reason
                .unwrap_or_else(|| "transfer failed".to_string());
            warn!(
                "Payout {} failed on {}: {}",
                transaction_id, escrow_account_id, reason
            );
            account.mark_payout_failed(transaction_id, reason, now)?;
        } else {
            // Unknown processor status: leave the payout Approved and make
            // the operator look before any retry
            return Err(PactumError::Gateway {
                code: "GATEWAY_UNKNOWN_STATUS".to_string(),
                message: format!("unrecognized transfer status {:?}", outcome.status),
                retriable: false,
            });
        }

        let transaction = found_transaction(&account, transaction_id)?;
        self.persist(account).await?;
        Ok(transaction)
    }

    // ========================================================================
    // Refunds, fees, disputes
    // ========================================================================

    /// Record money returned into escrow
    pub async fn record_refund(
        &self,
        acting_user: UserId,
        escrow_account_id: EscrowAccountId,
        amount: Money,
        description: Option<String>,
        transfer_reference: Option<String>,
        idempotency_key: IdempotencyKey,
    ) -> Result<EscrowTransaction> {
        let mut account = self.escrow_accounts.get(escrow_account_id).await?;
        ensure_account_owner(&account, acting_user)?;
        let transaction = account
            .register_refund(
                TransactionId::new(),
                amount,
                description,
                transfer_reference,
                idempotency_key,
                self.clock.now(),
            )?
            .clone();
        self.persist_new_row(account, &transaction).await?;

        info!(
            "Refund {} of {} recorded on {}",
            transaction.transaction_id, amount, escrow_account_id
        );
        Ok(transaction)
    }

    /// Charge a platform fee against the available balance
    pub async fn charge_fee(
        &self,
        acting_user: UserId,
        escrow_account_id: EscrowAccountId,
        amount: Money,
        description: Option<String>,
        idempotency_key: IdempotencyKey,
    ) -> Result<EscrowTransaction> {
        let mut account = self.escrow_accounts.get(escrow_account_id).await?;
        ensure_account_owner(&account, acting_user)?;
        let transaction = account
            .charge_fee(
                TransactionId::new(),
                amount,
                description,
                idempotency_key,
                self.clock.now(),
            )?
            .clone();
        self.persist_new_row(account, &transaction).await?;

        info!(
            "Fee {} of {} charged on {}",
            transaction.transaction_id, amount, escrow_account_id
        );
        Ok(transaction)
    }

    /// Flag a settled transaction as disputed
    pub async fn dispute_transaction(
        &self,
        acting_user: UserId,
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        reason: impl Into<String>,
    ) -> Result<EscrowTransaction> {
        let mut account = self.escrow_accounts.get(escrow_account_id).await?;
        ensure_account_owner(&account, acting_user)?;
        account.mark_transaction_disputed(transaction_id, reason, self.clock.now())?;
        let transaction = found_transaction(&account, transaction_id)?;
        self.persist(account).await?;

        warn!(
            "Transaction {} disputed on {}",
            transaction_id, escrow_account_id
        );
        Ok(transaction)
    }

    // ========================================================================
    // Account plumbing
    // ========================================================================

    /// Link the escrow account to its external source account
    pub async fn connect_escrow_account(
        &self,
        acting_user: UserId,
        escrow_account_id: EscrowAccountId,
        authorization_code: &str,
    ) -> Result<EscrowAccount> {
        let mut account = self.escrow_accounts.get(escrow_account_id).await?;
        ensure_account_owner(&account, acting_user)?;
        let account_ref = self
            .gateway
            .connect_account(acting_user, authorization_code)
            .await?;
        account.link_external_account(account_ref, self.clock.now())?;
        self.persist(account).await
    }

    pub async fn get_account(&self, escrow_account_id: EscrowAccountId) -> Result<EscrowAccount> {
        self.escrow_accounts.get(escrow_account_id).await
    }

    /// Ledger entries, newest first
    pub async fn list_transactions(
        &self,
        escrow_account_id: EscrowAccountId,
    ) -> Result<Vec<EscrowTransaction>> {
        self.escrow_accounts.list_transactions(escrow_account_id).await
    }

    // ========================================================================
    // Webhooks
    // ========================================================================

    /// Verify a processor notification and apply its ledger effect
    ///
    /// Redelivered notifications are tolerated: a deposit already Completed
    /// confirms as a no-op, a payout already Completed is returned as-is.
    pub async fn process_webhook(
        &self,
        payload: &str,
        signature: &str,
    ) -> Result<WebhookOutcome> {
        let event = self.gateway.handle_webhook(payload, signature).await?;
        match event {
            WebhookEvent::DepositSucceeded {
                escrow_account_id,
                payment_reference,
            } => {
                let now = self.clock.now();
                let mut account = self.escrow_accounts.get(escrow_account_id).await?;
                let transaction_id = account
                    .transactions()
                    .iter()
                    .find(|t| {
                        t.is_deposit()
                            && t.payment_reference.as_deref() == Some(payment_reference.as_str())
                    })
                    .map(|t| t.transaction_id)
                    .ok_or_else(|| PactumError::TransactionNotFound {
                        transaction_id: payment_reference.clone(),
                    })?;

                account.confirm_deposit(transaction_id, Some(payment_reference), now)?;
                let transaction = found_transaction(&account, transaction_id)?;
                self.persist(account).await?;

                info!(
                    "Webhook confirmed deposit {} on {}",
                    transaction_id, escrow_account_id
                );
                Ok(WebhookOutcome::DepositConfirmed(transaction))
            }
            WebhookEvent::PayoutSettled {
                escrow_account_id,
                transaction_id,
                transfer_reference,
            } => {
                let mut account = self.escrow_accounts.get(escrow_account_id).await?;
                let existing = found_transaction(&account, transaction_id)?;
                if existing.status == TransactionStatus::Completed {
                    return Ok(WebhookOutcome::PayoutSettled(existing));
                }

                account.mark_payout_executed(
                    transaction_id,
                    transfer_reference,
                    self.clock.now(),
                )?;
                let transaction = found_transaction(&account, transaction_id)?;
                self.persist(account).await?;

                info!(
                    "Webhook settled payout {} on {}",
                    transaction_id, escrow_account_id
                );
                Ok(WebhookOutcome::PayoutSettled(transaction))
            }
            WebhookEvent::Unrecognized { event_type } => {
                info!("Ignoring webhook event type {}", event_type);
                Ok(WebhookOutcome::Ignored { event_type })
            }
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn transfer_to_party(
        &self,
        account: &EscrowAccount,
        payout: &EscrowTransaction,
        party_id: PartyId,
    ) -> Result<TransferOutcome> {
        let agreement = self.agreements.get(account.agreement_id()).await?;
        let party = agreement.party(&party_id).ok_or_else(|| {
            PactumError::PartyNotFound {
                party_id: party_id.to_string(),
            }
        })?;
        let destination = party.payout_account_id.clone().ok_or_else(|| {
            PactumError::PayoutAccountMissing {
                party_id: party_id.to_string(),
            }
        })?;

        let exec = self
            .gateway
            .execute_escrow_payout(
                account.escrow_account_id(),
                payout.transaction_id,
                payout.amount,
                &destination,
            )
            .await?;
        Ok(TransferOutcome {
            settled: exec.is_settled(),
            failed: exec.is_failed(),
            status: exec.status,
            reference: exec.transfer_id,
            failure_reason: exec.failure_reason,
        })
    }

    async fn transfer_split(
        &self,
        account: &EscrowAccount,
        payout: &EscrowTransaction,
    ) -> Result<TransferOutcome> {
        let agreement = self.agreements.get(account.agreement_id()).await?;
        self.policy.ensure_all_parties_linked(&agreement)?;
        let splits = self.policy.payout_splits(&agreement, payout.amount)?;
        let transfers: Vec<SplitTransfer> = splits
            .iter()
            .map(|split| SplitTransfer {
                destination_account_ref: split.account_ref.clone(),
                amount: split.share,
            })
            .collect();

        let exec = self
            .gateway
            .execute_split_payout(account.payout_account_id(), &transfers)
            .await?;
        let reference = if exec.transfer_ids.is_empty() {
            None
        } else {
            Some(exec.transfer_ids.join(","))
        };
        Ok(TransferOutcome {
            settled: exec.is_settled(),
            failed: exec.is_failed(),
            status: exec.status,
            reference,
            failure_reason: exec.failure_reason,
        })
    }

    async fn persist(&self, mut account: EscrowAccount) -> Result<EscrowAccount> {
        let events = account.take_events();
        let stored = self.escrow_accounts.update(&account).await?;
        self.dispatch(events).await;
        Ok(stored)
    }

    async fn persist_new_row(
        &self,
        mut account: EscrowAccount,
        transaction: &EscrowTransaction,
    ) -> Result<EscrowAccount> {
        let events = account.take_events();
        let stored = self.escrow_accounts.update(&account).await?;
        self.escrow_accounts
            .add_transaction(stored.escrow_account_id(), transaction)
            .await?;
        self.dispatch(events).await;
        Ok(stored)
    }

    async fn dispatch(&self, events: Vec<DomainEvent>) {
        for event in &events {
            if let Err(e) = self.dispatcher.publish(event).await {
                warn!("Event dispatch failed for {}: {}", event.name(), e);
            }
        }
    }
}

fn ensure_account_owner(account: &EscrowAccount, acting_user: UserId) -> Result<()> {
    if account.owner_user_id() != acting_user {
        return Err(PactumError::NotOwner {
            user_id: acting_user.to_string(),
        });
    }
    Ok(())
}

fn found_transaction(
    account: &EscrowAccount,
    transaction_id: TransactionId,
) -> Result<EscrowTransaction> {
    account
        .transaction(&transaction_id)
        .cloned()
        .ok_or_else(|| PactumError::TransactionNotFound {
            transaction_id: transaction_id.to_string(),
        })
}
