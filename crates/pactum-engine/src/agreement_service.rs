//! Commission agreement commands

use crate::clock::Clock;
use crate::dispatch::EventDispatcher;
use crate::repository::{AgreementRepository, EscrowAccountRepository};
use pactum_agreement::{CommissionAgreement, NewMilestone, NewParty};
use pactum_escrow::EscrowAccount;
use pactum_gateway::PaymentGateway;
use pactum_policy::AgreementRules;
use pactum_types::{
    AgreementId, DomainEvent, EscrowAccountId, MilestoneId, Money, PactumError, PartyId, Result,
    TransactionId, UserId,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Orchestrates the agreement lifecycle from draft to settlement
pub struct AgreementService {
    agreements: Arc<dyn AgreementRepository>,
    escrow_accounts: Arc<dyn EscrowAccountRepository>,
    gateway: Arc<dyn PaymentGateway>,
    dispatcher: Arc<dyn EventDispatcher>,
    clock: Arc<dyn Clock>,
    rules: AgreementRules,
}

impl AgreementService {
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
            rules: AgreementRules::new(),
        }
    }

    // ========================================================================
    // Draft assembly
    // ========================================================================

    /// Open a new agreement in Draft
    pub async fn create_agreement(
        &self,
        owner_user_id: UserId,
        title: impl Into<String>,
        description: Option<String>,
        total_value: Money,
        terms: Option<String>,
    ) -> Result<CommissionAgreement> {
        let now = self.clock.now();
        let mut agreement = CommissionAgreement::create(
            AgreementId::new(),
            owner_user_id,
            title,
            description,
            total_value,
            terms,
            now,
        )?;

        let events = agreement.take_events();
        self.agreements.add(&agreement).await?;
        self.dispatch(events).await;

        info!(
            "Agreement {} created by {} for {}",
            agreement.agreement_id(),
            owner_user_id,
            agreement.total_value()
        );
        Ok(agreement)
    }

    pub async fn add_party(
        &self,
        acting_user: UserId,
        agreement_id: AgreementId,
        input: NewParty,
    ) -> Result<CommissionAgreement> {
        let mut agreement = self.agreements.get(agreement_id).await?;
        ensure_owner(&agreement, acting_user)?;
        agreement.add_party(input, self.clock.now())?;
        self.persist(agreement).await
    }

    pub async fn add_milestone(
        &self,
        acting_user: UserId,
        agreement_id: AgreementId,
        input: NewMilestone,
    ) -> Result<CommissionAgreement> {
        let mut agreement = self.agreements.get(agreement_id).await?;
        ensure_owner(&agreement, acting_user)?;
        agreement.add_milestone(input, self.clock.now())?;
        self.persist(agreement).await
    }

    /// Amend title, description or terms while still in Draft
    pub async fn update_agreement_details(
        &self,
        acting_user: UserId,
        agreement_id: AgreementId,
        title: Option<String>,
        description: Option<String>,
        terms: Option<String>,
    ) -> Result<CommissionAgreement> {
        let mut agreement = self.agreements.get(agreement_id).await?;
        ensure_owner(&agreement, acting_user)?;
        agreement.update_details(title, description, terms, self.clock.now())?;
        self.persist(agreement).await
    }

    /// Record a party's acceptance of the draft terms
    pub async fn accept_agreement(
        &self,
        agreement_id: AgreementId,
        party_id: PartyId,
    ) -> Result<CommissionAgreement> {
        let mut agreement = self.agreements.get(agreement_id).await?;
        agreement.accept(party_id, self.clock.now())?;
        self.persist(agreement).await
    }

    /// Exchange an authorization code for a payout account and link it
    ///
    /// The gateway call happens only after the party is known to exist, so a
    /// bad party id never creates an orphaned connected account.
    pub async fn connect_party_payout_account(
        &self,
        acting_user: UserId,
        agreement_id: AgreementId,
        party_id: PartyId,
        authorization_code: &str,
    ) -> Result<CommissionAgreement> {
        let mut agreement = self.agreements.get(agreement_id).await?;
        if agreement.party(&party_id).is_none() {
            return Err(PactumError::PartyNotFound {
                party_id: party_id.to_string(),
            });
        }

        let account_ref = self
            .gateway
            .connect_account(acting_user, authorization_code)
            .await?;
        agreement.link_party_payout_account(party_id, account_ref, self.clock.now())?;
        self.persist(agreement).await
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Activate the agreement and open its escrow account in one unit of work
    pub async fn activate_agreement(
        &self,
        acting_user: UserId,
        agreement_id: AgreementId,
    ) -> Result<CommissionAgreement> {
        let now = self.clock.now();
        let mut agreement = self.agreements.get(agreement_id).await?;
        ensure_owner(&agreement, acting_user)?;
        self.rules.ensure_can_activate(&agreement)?;

        agreement.activate(now)?;
        let mut escrow = EscrowAccount::create(
            EscrowAccountId::new(),
            agreement_id,
            agreement.owner_user_id(),
            agreement.currency(),
            now,
        )?;
        agreement.attach_escrow_account(escrow.escrow_account_id())?;

        // The account write lands first; a version conflict on the agreement
        // leaves only an unreferenced account behind
        let escrow_events = escrow.take_events();
        self.escrow_accounts.add(&escrow).await?;
        let agreement_events = agreement.take_events();
        let stored = self.agreements.update(&agreement).await?;
        self.dispatch(agreement_events).await;
        self.dispatch(escrow_events).await;

        info!(
            "Agreement {} activated with escrow account {}",
            agreement_id,
            escrow.escrow_account_id()
        );
        Ok(stored)
    }

    /// Close out a fully delivered agreement
    ///
    /// Requires every milestone completed and no payout still pending or
    /// approved on the escrow account.
    pub async fn complete_agreement(
        &self,
        acting_user: UserId,
        agreement_id: AgreementId,
    ) -> Result<CommissionAgreement> {
        let mut agreement = self.agreements.get(agreement_id).await?;
        ensure_owner(&agreement, acting_user)?;
        self.rules.ensure_can_complete(&agreement)?;
        if let Some(escrow_account_id) = agreement.escrow_account_id() {
            let account = self.escrow_accounts.get(escrow_account_id).await?;
            self.rules.ensure_escrow_settled(&account)?;
        }

        agreement.complete(self.clock.now())?;
        let stored = self.persist(agreement).await?;
        info!("Agreement {} completed", agreement_id);
        Ok(stored)
    }

    pub async fn cancel_agreement(
        &self,
        acting_user: UserId,
        agreement_id: AgreementId,
        reason: impl Into<String>,
    ) -> Result<CommissionAgreement> {
        let mut agreement = self.agreements.get(agreement_id).await?;
        ensure_owner(&agreement, acting_user)?;
        agreement.cancel(reason, self.clock.now())?;
        let stored = self.persist(agreement).await?;
        info!("Agreement {} canceled", agreement_id);
        Ok(stored)
    }

    pub async fn dispute_agreement(
        &self,
        acting_user: UserId,
        agreement_id: AgreementId,
        reason: impl Into<String>,
    ) -> Result<CommissionAgreement> {
        let mut agreement = self.agreements.get(agreement_id).await?;
        ensure_owner(&agreement, acting_user)?;
        agreement.dispute(reason, self.clock.now())?;
        let stored = self.persist(agreement).await?;
        warn!("Agreement {} disputed", agreement_id);
        Ok(stored)
    }

    // ========================================================================
    // Milestones
    // ========================================================================

    pub async fn complete_milestone(
        &self,
        acting_user: UserId,
        agreement_id: AgreementId,
        milestone_id: MilestoneId,
        notes: Option<String>,
        released_payout_transaction_id: Option<TransactionId>,
    ) -> Result<CommissionAgreement> {
        let mut agreement = self.agreements.get(agreement_id).await?;
        ensure_owner(&agreement, acting_user)?;
        agreement.complete_milestone(
            milestone_id,
            notes,
            released_payout_transaction_id,
            self.clock.now(),
        )?;
        self.persist(agreement).await
    }

    /// Flag every pending milestone past its due date
    ///
    /// Driven externally (no internal scheduler); returns the flagged ids.
    pub async fn sweep_overdue_milestones(
        &self,
        agreement_id: AgreementId,
    ) -> Result<Vec<MilestoneId>> {
        let now = self.clock.now();
        let mut agreement = self.agreements.get(agreement_id).await?;
        let overdue: Vec<MilestoneId> = self
            .rules
            .overdue_milestones(&agreement, now)
            .iter()
            .map(|m| m.milestone_id)
            .collect();
        if overdue.is_empty() {
            return Ok(overdue);
        }

        for milestone_id in &overdue {
            agreement.mark_milestone_overdue(*milestone_id, now)?;
        }
        self.persist(agreement).await?;

        info!(
            "{} milestone(s) marked overdue on agreement {}",
            overdue.len(),
            agreement_id
        );
        Ok(overdue)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get_agreement(&self, agreement_id: AgreementId) -> Result<CommissionAgreement> {
        self.agreements.get(agreement_id).await
    }

    pub async fn list_agreements(&self, owner_user_id: UserId) -> Result<Vec<CommissionAgreement>> {
        self.agreements.list_by_owner(owner_user_id).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn persist(&self, mut agreement: CommissionAgreement) -> Result<CommissionAgreement> {
        let events = agreement.take_events();
        let stored = self.agreements.update(&agreement).await?;
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

fn ensure_owner(agreement: &CommissionAgreement, acting_user: UserId) -> Result<()> {
    if agreement.owner_user_id() != acting_user {
        return Err(PactumError::NotOwner {
            user_id: acting_user.to_string(),
        });
    }
    Ok(())
}
