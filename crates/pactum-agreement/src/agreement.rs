//! The commission agreement aggregate root
//!
//! All mutation goes through methods on [`CommissionAgreement`]; guards run
//! before any field changes, so a failed operation leaves the aggregate
//! exactly as it was. Successful transitions record domain events which the
//! application layer dispatches after persisting the aggregate.

use crate::{AgreementParty, AgreementStatus, Milestone, MilestoneStatus, NewMilestone, NewParty};
use chrono::{DateTime, Utc};
use pactum_types::{
    AgreementId, Currency, DomainEvent, EscrowAccountId, MilestoneId, Money, PactumError, PartyId,
    Percentage, Result, TransactionId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A commission agreement between an owner and a set of parties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionAgreement {
    agreement_id: AgreementId,
    owner_user_id: UserId,
    title: String,
    description: Option<String>,
    terms: Option<String>,
    total_value: Money,
    status: AgreementStatus,
    escrow_account_id: Option<EscrowAccountId>,
    parties: Vec<AgreementParty>,
    milestones: Vec<Milestone>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    canceled_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl CommissionAgreement {
    /// Create a new agreement in Draft
    pub fn create(
        agreement_id: AgreementId,
        owner_user_id: UserId,
        title: impl Into<String>,
        description: Option<String>,
        total_value: Money,
        terms: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if agreement_id.is_nil() {
            return Err(PactumError::invalid_identifier("agreement_id"));
        }
        if owner_user_id.is_nil() {
            return Err(PactumError::invalid_identifier("owner_user_id"));
        }
        let title = title.into();
        if title.trim().is_empty() {
            return Err(PactumError::blank_field("title"));
        }
        if !total_value.is_positive() {
            return Err(PactumError::invalid_amount(
                "agreement total value must be positive",
            ));
        }

        let mut agreement = Self {
            agreement_id,
            owner_user_id,
            title: title.clone(),
            description,
            terms,
            total_value,
            status: AgreementStatus::Draft,
            escrow_account_id: None,
            parties: Vec::new(),
            milestones: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
            activated_at: None,
            completed_at: None,
            canceled_at: None,
            events: Vec::new(),
        };
        agreement.record(DomainEvent::AgreementCreated {
            agreement_id,
            owner_user_id,
            title,
            total_value,
            occurred_at: now,
        });
        Ok(agreement)
    }

    // ========================================================================
    // Parties
    // ========================================================================

    /// Add a party to a draft agreement
    ///
    /// Fails if the agreement left Draft, the party id is already taken, or
    /// the split sum would exceed 100%.
    pub fn add_party(&mut self, input: NewParty, now: DateTime<Utc>) -> Result<&AgreementParty> {
        self.ensure_draft()?;
        if input.party_id.is_nil() {
            return Err(PactumError::invalid_identifier("party_id"));
        }
        if input.party_name.trim().is_empty() {
            return Err(PactumError::blank_field("party_name"));
        }
        if self.party(&input.party_id).is_some() {
            return Err(PactumError::DuplicateParty {
                party_id: input.party_id.to_string(),
            });
        }
        let new_total = self.split_total_decimal() + input.split.value();
        if new_total > Decimal::ONE_HUNDRED {
            return Err(PactumError::SplitLimitExceeded {
                total: new_total.to_string(),
            });
        }

        self.record(DomainEvent::PartyAdded {
            agreement_id: self.agreement_id,
            party_id: input.party_id,
            party_name: input.party_name.clone(),
            split: input.split,
            occurred_at: now,
        });
        self.parties.push(AgreementParty::from_input(input, now));
        self.touch(now);
        Ok(&self.parties[self.parties.len() - 1])
    }

    /// Record a party's acceptance of the terms
    ///
    /// A second acceptance is a no-op and records no event.
    pub fn accept(&mut self, party_id: PartyId, now: DateTime<Utc>) -> Result<()> {
        self.ensure_draft()?;
        let agreement_id = self.agreement_id;
        let party = self.party_mut(&party_id)?;
        if party.has_accepted {
            return Ok(());
        }
        party.has_accepted = true;
        party.accepted_at = Some(now);
        self.record(DomainEvent::PartyAccepted {
            agreement_id,
            party_id,
            occurred_at: now,
        });
        self.touch(now);
        Ok(())
    }

    /// Link a party's external payout destination
    pub fn link_party_payout_account(
        &mut self,
        party_id: PartyId,
        account_ref: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let account_ref = account_ref.into();
        if account_ref.trim().is_empty() {
            return Err(PactumError::blank_field("payout_account_id"));
        }
        let party = self.party_mut(&party_id)?;
        party.payout_account_id = Some(account_ref);
        party.payout_account_linked_at = Some(now);
        self.touch(now);
        Ok(())
    }

    /// Remove a party's external payout destination
    pub fn unlink_party_payout_account(
        &mut self,
        party_id: PartyId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let party = self.party_mut(&party_id)?;
        party.payout_account_id = None;
        party.payout_account_linked_at = None;
        self.touch(now);
        Ok(())
    }

    // ========================================================================
    // Milestones
    // ========================================================================

    /// Add a milestone to a draft agreement
    ///
    /// The value must be positive, in the agreement currency, and milestone
    /// values may never sum past the agreement total.
    pub fn add_milestone(
        &mut self,
        input: NewMilestone,
        now: DateTime<Utc>,
    ) -> Result<&Milestone> {
        self.ensure_draft()?;
        if input.milestone_id.is_nil() {
            return Err(PactumError::invalid_identifier("milestone_id"));
        }
        if input.description.trim().is_empty() {
            return Err(PactumError::blank_field("description"));
        }
        if !input.value.is_positive() {
            return Err(PactumError::invalid_amount(
                "milestone value must be positive",
            ));
        }
        if input.value.currency() != self.currency() {
            return Err(PactumError::CurrencyMismatch {
                expected: self.currency().code().to_string(),
                actual: input.value.currency().code().to_string(),
            });
        }
        if self.milestone(&input.milestone_id).is_some() {
            return Err(PactumError::DuplicateMilestone {
                milestone_id: input.milestone_id.to_string(),
            });
        }
        let attempted = self.milestones_value_total().add(input.value)?;
        if attempted > self.total_value {
            return Err(PactumError::MilestonesExceedTotal {
                attempted: attempted.to_string(),
                total: self.total_value.to_string(),
            });
        }

        self.record(DomainEvent::MilestoneAdded {
            agreement_id: self.agreement_id,
            milestone_id: input.milestone_id,
            description: input.description.clone(),
            value: input.value,
            due_date: input.due_date,
            occurred_at: now,
        });
        self.milestones
            .push(Milestone::from_input(input, self.agreement_id, now));
        self.touch(now);
        Ok(&self.milestones[self.milestones.len() - 1])
    }

    /// Mark a milestone delivered
    ///
    /// Completing an already-completed milestone is a no-op. Overdue
    /// milestones may still complete.
    pub fn complete_milestone(
        &mut self,
        milestone_id: MilestoneId,
        notes: Option<String>,
        released_payout_transaction_id: Option<TransactionId>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let agreement_id = self.agreement_id;
        let milestone = self.milestone_mut(&milestone_id)?;
        if milestone.is_completed() {
            return Ok(());
        }
        milestone.status = MilestoneStatus::Completed;
        milestone.completed_at = Some(now);
        milestone.completion_notes = notes;
        if released_payout_transaction_id.is_some() {
            milestone.released_payout_transaction_id = released_payout_transaction_id;
        }
        self.record(DomainEvent::MilestoneCompleted {
            agreement_id,
            milestone_id,
            occurred_at: now,
        });
        self.touch(now);
        Ok(())
    }

    /// Flag a pending milestone that slipped past its due date
    ///
    /// Driven externally; completed or already-overdue milestones are left
    /// alone.
    pub fn mark_milestone_overdue(
        &mut self,
        milestone_id: MilestoneId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let agreement_id = self.agreement_id;
        let milestone = self.milestone_mut(&milestone_id)?;
        if milestone.status != MilestoneStatus::Pending {
            return Ok(());
        }
        milestone.status = MilestoneStatus::Overdue;
        let due_date = milestone.due_date;
        self.record(DomainEvent::MilestoneOverdue {
            agreement_id,
            milestone_id,
            due_date,
            occurred_at: now,
        });
        self.touch(now);
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Bind the escrow account; the binding is one-time
    pub fn attach_escrow_account(&mut self, escrow_account_id: EscrowAccountId) -> Result<()> {
        if self.escrow_account_id.is_some() {
            return Err(PactumError::EscrowAlreadyAttached {
                agreement_id: self.agreement_id.to_string(),
            });
        }
        self.escrow_account_id = Some(escrow_account_id);
        Ok(())
    }

    /// Move the agreement from Draft to Active
    ///
    /// Requires at least one party, unanimous acceptance, and the split sum
    /// closed at exactly 100%.
    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_draft()?;
        if self.parties.is_empty() {
            return Err(PactumError::NoParties {
                agreement_id: self.agreement_id.to_string(),
            });
        }
        if let Some(party) = self.parties.iter().find(|p| !p.has_accepted) {
            return Err(PactumError::PartyNotAccepted {
                party_id: party.party_id.to_string(),
            });
        }
        let total = self.split_total_decimal();
        if total != Decimal::ONE_HUNDRED {
            return Err(PactumError::SplitNotClosed {
                total: total.to_string(),
            });
        }

        self.status = AgreementStatus::Active;
        self.activated_at = Some(now);
        self.record(DomainEvent::AgreementActivated {
            agreement_id: self.agreement_id,
            occurred_at: now,
        });
        self.touch(now);
        Ok(())
    }

    /// Move the agreement from Active to Completed
    ///
    /// The aggregate asserts the status transition only; the cross-cutting
    /// completion rule (all milestones done, escrow settled) lives in the
    /// rules service and runs before this.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != AgreementStatus::Active {
            return Err(PactumError::AgreementNotActive {
                agreement_id: self.agreement_id.to_string(),
                status: self.status.to_string(),
            });
        }
        self.status = AgreementStatus::Completed;
        self.completed_at = Some(now);
        self.record(DomainEvent::AgreementCompleted {
            agreement_id: self.agreement_id,
            occurred_at: now,
        });
        self.touch(now);
        Ok(())
    }

    /// Flag the agreement as disputed
    ///
    /// Disputing an already-disputed agreement is a no-op.
    pub fn dispute(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(PactumError::blank_field("reason"));
        }
        if self.status.is_terminal() {
            return Err(PactumError::AgreementFinalized {
                agreement_id: self.agreement_id.to_string(),
                status: self.status.to_string(),
            });
        }
        if self.status == AgreementStatus::Disputed {
            return Ok(());
        }
        self.status = AgreementStatus::Disputed;
        self.record(DomainEvent::AgreementDisputed {
            agreement_id: self.agreement_id,
            reason,
            occurred_at: now,
        });
        self.touch(now);
        Ok(())
    }

    /// Cancel the agreement; fails once it reached a terminal state
    pub fn cancel(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(PactumError::AgreementFinalized {
                agreement_id: self.agreement_id.to_string(),
                status: self.status.to_string(),
            });
        }
        self.status = AgreementStatus::Canceled;
        self.canceled_at = Some(now);
        self.record(DomainEvent::AgreementCanceled {
            agreement_id: self.agreement_id,
            reason: reason.into(),
            occurred_at: now,
        });
        self.touch(now);
        Ok(())
    }

    /// Update title, description or terms while still in Draft
    pub fn update_details(
        &mut self,
        title: Option<String>,
        description: Option<String>,
        terms: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_draft()?;
        if let Some(title) = title {
            if title.trim().is_empty() {
                return Err(PactumError::blank_field("title"));
            }
            self.title = title;
        }
        if description.is_some() {
            self.description = description;
        }
        if terms.is_some() {
            self.terms = terms;
        }
        self.touch(now);
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn agreement_id(&self) -> AgreementId {
        self.agreement_id
    }

    pub fn owner_user_id(&self) -> UserId {
        self.owner_user_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn terms(&self) -> Option<&str> {
        self.terms.as_deref()
    }

    pub fn total_value(&self) -> Money {
        self.total_value
    }

    /// The agreement currency, fixed at creation
    pub fn currency(&self) -> Currency {
        self.total_value.currency()
    }

    pub fn status(&self) -> AgreementStatus {
        self.status
    }

    pub fn escrow_account_id(&self) -> Option<EscrowAccountId> {
        self.escrow_account_id
    }

    pub fn parties(&self) -> &[AgreementParty] {
        &self.parties
    }

    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    pub fn party(&self, party_id: &PartyId) -> Option<&AgreementParty> {
        self.parties.iter().find(|p| &p.party_id == party_id)
    }

    pub fn milestone(&self, milestone_id: &MilestoneId) -> Option<&Milestone> {
        self.milestones
            .iter()
            .find(|m| &m.milestone_id == milestone_id)
    }

    /// Sum of party splits; bounded by 100% at every insertion
    pub fn split_total(&self) -> Percentage {
        Percentage::new(self.split_total_decimal()).unwrap_or(Percentage::FULL)
    }

    /// Sum of milestone values
    pub fn milestones_value_total(&self) -> Money {
        self.milestones
            .iter()
            .fold(Money::zero(self.currency()), |acc, m| {
                acc.add(m.value).unwrap_or(acc)
            })
    }

    /// Whether every party has accepted
    pub fn all_parties_accepted(&self) -> bool {
        !self.parties.is_empty() && self.parties.iter().all(|p| p.has_accepted)
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

    pub fn activated_at(&self) -> Option<DateTime<Utc>> {
        self.activated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn canceled_at(&self) -> Option<DateTime<Utc>> {
        self.canceled_at
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

    fn ensure_draft(&self) -> Result<()> {
        if self.status != AgreementStatus::Draft {
            return Err(PactumError::AgreementNotDraft {
                agreement_id: self.agreement_id.to_string(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    fn party_mut(&mut self, party_id: &PartyId) -> Result<&mut AgreementParty> {
        self.parties
            .iter_mut()
            .find(|p| &p.party_id == party_id)
            .ok_or_else(|| PactumError::PartyNotFound {
                party_id: party_id.to_string(),
            })
    }

    fn milestone_mut(&mut self, milestone_id: &MilestoneId) -> Result<&mut Milestone> {
        self.milestones
            .iter_mut()
            .find(|m| &m.milestone_id == milestone_id)
            .ok_or_else(|| PactumError::MilestoneNotFound {
                milestone_id: milestone_id.to_string(),
            })
    }

    fn split_total_decimal(&self) -> Decimal {
        self.parties
            .iter()
            .map(|p| p.split_percentage.value())
            .sum()
    }

    fn record(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn usd(v: Decimal) -> Money {
        Money::new(v, Currency::usd()).unwrap()
    }

    fn pct(v: Decimal) -> Percentage {
        Percentage::new(v).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn draft(total: Decimal) -> CommissionAgreement {
        CommissionAgreement::create(
            AgreementId::new(),
            UserId::new(),
            "Q3 brokerage deal",
            None,
            usd(total),
            None,
            now(),
        )
        .unwrap()
    }

    fn accepted_two_party_draft() -> CommissionAgreement {
        let mut agreement = draft(dec!(10000));
        let a = agreement
            .add_party(NewParty::named("Alice", pct(dec!(60))), now())
            .unwrap()
            .party_id;
        let b = agreement
            .add_party(NewParty::named("Bob", pct(dec!(40))), now())
            .unwrap()
            .party_id;
        agreement.accept(a, now()).unwrap();
        agreement.accept(b, now()).unwrap();
        agreement
    }

    #[test]
    fn test_create_validates_inputs() {
        assert!(CommissionAgreement::create(
            AgreementId::new(),
            UserId::new(),
            "   ",
            None,
            usd(dec!(100)),
            None,
            now(),
        )
        .is_err());

        assert!(CommissionAgreement::create(
            AgreementId::new(),
            UserId::from_uuid(uuid::Uuid::nil()),
            "Deal",
            None,
            usd(dec!(100)),
            None,
            now(),
        )
        .is_err());

        assert!(CommissionAgreement::create(
            AgreementId::new(),
            UserId::new(),
            "Deal",
            None,
            usd(dec!(0)),
            None,
            now(),
        )
        .is_err());
    }

    #[test]
    fn test_create_records_event() {
        let agreement = draft(dec!(5000));
        assert_eq!(agreement.status(), AgreementStatus::Draft);
        assert_eq!(agreement.events().len(), 1);
        assert!(matches!(
            agreement.events()[0],
            DomainEvent::AgreementCreated { .. }
        ));
    }

    #[test]
    fn test_add_party_enforces_split_limit() {
        let mut agreement = draft(dec!(10000));
        agreement
            .add_party(NewParty::named("Alice", pct(dec!(60))), now())
            .unwrap();
        let result = agreement.add_party(NewParty::named("Bob", pct(dec!(50))), now());
        assert!(matches!(
            result,
            Err(PactumError::SplitLimitExceeded { .. })
        ));
        assert_eq!(agreement.parties().len(), 1);
    }

    #[test]
    fn test_add_party_rejects_duplicates() {
        let mut agreement = draft(dec!(10000));
        let party = NewParty::named("Alice", pct(dec!(30)));
        agreement.add_party(party.clone(), now()).unwrap();
        let result = agreement.add_party(party, now());
        assert!(matches!(result, Err(PactumError::DuplicateParty { .. })));
    }

    #[test]
    fn test_add_party_requires_draft() {
        let mut agreement = accepted_two_party_draft();
        agreement.activate(now()).unwrap();
        let result = agreement.add_party(NewParty::named("Carol", pct(dec!(0))), now());
        assert!(matches!(result, Err(PactumError::AgreementNotDraft { .. })));
    }

    #[test]
    fn test_accept_is_idempotent() {
        let mut agreement = draft(dec!(10000));
        let party_id = agreement
            .add_party(NewParty::named("Alice", pct(dec!(100))), now())
            .unwrap()
            .party_id;
        agreement.accept(party_id, now()).unwrap();
        let events_after_first = agreement.events().len();
        agreement.accept(party_id, now()).unwrap();
        assert_eq!(agreement.events().len(), events_after_first);
    }

    #[test]
    fn test_accept_unknown_party_fails() {
        let mut agreement = draft(dec!(10000));
        assert!(matches!(
            agreement.accept(PartyId::new(), now()),
            Err(PactumError::PartyNotFound { .. })
        ));
    }

    #[test]
    fn test_activation_requires_exact_split_closure() {
        let mut agreement = draft(dec!(10000));
        let a = agreement
            .add_party(NewParty::named("Alice", pct(dec!(59.9))), now())
            .unwrap()
            .party_id;
        let b = agreement
            .add_party(NewParty::named("Bob", pct(dec!(40))), now())
            .unwrap()
            .party_id;
        agreement.accept(a, now()).unwrap();
        agreement.accept(b, now()).unwrap();

        let result = agreement.activate(now());
        assert!(matches!(result, Err(PactumError::SplitNotClosed { .. })));
        assert_eq!(agreement.status(), AgreementStatus::Draft);
    }

    #[test]
    fn test_activation_requires_unanimous_acceptance() {
        let mut agreement = draft(dec!(10000));
        let a = agreement
            .add_party(NewParty::named("Alice", pct(dec!(60))), now())
            .unwrap()
            .party_id;
        agreement
            .add_party(NewParty::named("Bob", pct(dec!(40))), now())
            .unwrap();
        agreement.accept(a, now()).unwrap();

        let result = agreement.activate(now());
        assert!(matches!(result, Err(PactumError::PartyNotAccepted { .. })));
    }

    #[test]
    fn test_activation_requires_parties() {
        let mut agreement = draft(dec!(10000));
        assert!(matches!(
            agreement.activate(now()),
            Err(PactumError::NoParties { .. })
        ));
    }

    #[test]
    fn test_activation_happy_path() {
        let mut agreement = accepted_two_party_draft();
        agreement.activate(now()).unwrap();
        assert_eq!(agreement.status(), AgreementStatus::Active);
        assert!(agreement.activated_at().is_some());
        assert!(matches!(
            agreement.events().last(),
            Some(DomainEvent::AgreementActivated { .. })
        ));
    }

    #[test]
    fn test_activation_does_not_require_milestones() {
        let mut agreement = accepted_two_party_draft();
        assert!(agreement.milestones().is_empty());
        assert!(agreement.activate(now()).is_ok());
    }

    #[test]
    fn test_milestones_bounded_by_total() {
        let mut agreement = draft(dec!(1000));
        let due = now() + Duration::days(30);
        agreement
            .add_milestone(NewMilestone::new("Phase 1", usd(dec!(700)), due), now())
            .unwrap();
        let result =
            agreement.add_milestone(NewMilestone::new("Phase 2", usd(dec!(400)), due), now());
        assert!(matches!(
            result,
            Err(PactumError::MilestonesExceedTotal { .. })
        ));
    }

    #[test]
    fn test_milestone_currency_must_match() {
        let mut agreement = draft(dec!(1000));
        let due = now() + Duration::days(30);
        let eur = Money::new(dec!(100), Currency::eur()).unwrap();
        let result = agreement.add_milestone(NewMilestone::new("Phase 1", eur, due), now());
        assert!(matches!(result, Err(PactumError::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_complete_milestone_is_idempotent() {
        let mut agreement = draft(dec!(1000));
        let due = now() + Duration::days(30);
        let milestone_id = agreement
            .add_milestone(NewMilestone::new("Phase 1", usd(dec!(500)), due), now())
            .unwrap()
            .milestone_id;
        agreement
            .complete_milestone(milestone_id, Some("done".into()), None, now())
            .unwrap();
        let events_after_first = agreement.events().len();
        agreement
            .complete_milestone(milestone_id, None, None, now())
            .unwrap();
        assert_eq!(agreement.events().len(), events_after_first);
        assert!(agreement.milestone(&milestone_id).unwrap().is_completed());
    }

    #[test]
    fn test_overdue_marking_skips_completed() {
        let mut agreement = draft(dec!(1000));
        let due = now() - Duration::days(1);
        let milestone_id = agreement
            .add_milestone(NewMilestone::new("Phase 1", usd(dec!(500)), due), now())
            .unwrap()
            .milestone_id;
        agreement
            .complete_milestone(milestone_id, None, None, now())
            .unwrap();
        agreement
            .mark_milestone_overdue(milestone_id, now())
            .unwrap();
        assert_eq!(
            agreement.milestone(&milestone_id).unwrap().status,
            MilestoneStatus::Completed
        );
    }

    #[test]
    fn test_overdue_marking_flags_pending() {
        let mut agreement = draft(dec!(1000));
        let due = now() - Duration::days(1);
        let milestone_id = agreement
            .add_milestone(NewMilestone::new("Phase 1", usd(dec!(500)), due), now())
            .unwrap()
            .milestone_id;
        agreement
            .mark_milestone_overdue(milestone_id, now())
            .unwrap();
        assert_eq!(
            agreement.milestone(&milestone_id).unwrap().status,
            MilestoneStatus::Overdue
        );
        assert!(matches!(
            agreement.events().last(),
            Some(DomainEvent::MilestoneOverdue { .. })
        ));
    }

    #[test]
    fn test_escrow_binding_is_one_time() {
        let mut agreement = draft(dec!(1000));
        agreement
            .attach_escrow_account(EscrowAccountId::new())
            .unwrap();
        let result = agreement.attach_escrow_account(EscrowAccountId::new());
        assert!(matches!(
            result,
            Err(PactumError::EscrowAlreadyAttached { .. })
        ));
    }

    #[test]
    fn test_complete_requires_active() {
        let mut agreement = draft(dec!(1000));
        assert!(matches!(
            agreement.complete(now()),
            Err(PactumError::AgreementNotActive { .. })
        ));
    }

    #[test]
    fn test_cancel_fails_after_completion() {
        let mut agreement = accepted_two_party_draft();
        agreement.activate(now()).unwrap();
        agreement.complete(now()).unwrap();
        let result = agreement.cancel("changed our minds", now());
        assert!(matches!(
            result,
            Err(PactumError::AgreementFinalized { .. })
        ));
    }

    #[test]
    fn test_cancel_from_draft_and_active() {
        let mut agreement = draft(dec!(1000));
        agreement.cancel("abandoned", now()).unwrap();
        assert_eq!(agreement.status(), AgreementStatus::Canceled);

        let mut agreement = accepted_two_party_draft();
        agreement.activate(now()).unwrap();
        agreement.cancel("fell through", now()).unwrap();
        assert_eq!(agreement.status(), AgreementStatus::Canceled);
        assert!(agreement.canceled_at().is_some());
    }

    #[test]
    fn test_dispute_then_cancel() {
        let mut agreement = accepted_two_party_draft();
        agreement.activate(now()).unwrap();
        agreement.dispute("split disagreement", now()).unwrap();
        assert_eq!(agreement.status(), AgreementStatus::Disputed);
        // Disputed is not terminal
        agreement.cancel("unresolvable", now()).unwrap();
        assert_eq!(agreement.status(), AgreementStatus::Canceled);
    }

    #[test]
    fn test_update_details_requires_draft() {
        let mut agreement = accepted_two_party_draft();
        agreement
            .update_details(Some("Renamed deal".into()), None, None, now())
            .unwrap();
        assert_eq!(agreement.title(), "Renamed deal");

        agreement.activate(now()).unwrap();
        let result = agreement.update_details(Some("Too late".into()), None, None, now());
        assert!(matches!(result, Err(PactumError::AgreementNotDraft { .. })));
    }

    #[test]
    fn test_take_events_drains_queue() {
        let mut agreement = accepted_two_party_draft();
        agreement.activate(now()).unwrap();
        let events = agreement.take_events();
        assert!(!events.is_empty());
        assert!(agreement.events().is_empty());
    }

    #[test]
    fn test_failed_guard_leaves_aggregate_unchanged() {
        let mut agreement = draft(dec!(10000));
        agreement
            .add_party(NewParty::named("Alice", pct(dec!(60))), now())
            .unwrap();
        let before_events = agreement.events().len();
        let before_updated = agreement.updated_at();

        let _ = agreement.add_party(NewParty::named("Bob", pct(dec!(50))), now());

        assert_eq!(agreement.parties().len(), 1);
        assert_eq!(agreement.events().len(), before_events);
        assert_eq!(agreement.updated_at(), before_updated);
    }
}
