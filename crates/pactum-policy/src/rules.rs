//! Agreement completion and settlement rules

use chrono::{DateTime, Utc};
use pactum_agreement::{AgreementStatus, CommissionAgreement, Milestone};
use pactum_escrow::EscrowAccount;
use pactum_types::{Money, PactumError, Result};

/// Cross-cutting rules consulted before agreement lifecycle transitions
///
/// The single authority for "can this agreement complete": the aggregate's
/// `complete` only asserts the status transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgreementRules;

impl AgreementRules {
    pub fn new() -> Self {
        Self
    }

    /// Advisory mirror of the activation guards
    pub fn ensure_can_activate(&self, agreement: &CommissionAgreement) -> Result<()> {
        if agreement.status() != AgreementStatus::Draft {
            return Err(PactumError::AgreementNotDraft {
                agreement_id: agreement.agreement_id().to_string(),
                status: agreement.status().to_string(),
            });
        }
        if agreement.parties().is_empty() {
            return Err(PactumError::NoParties {
                agreement_id: agreement.agreement_id().to_string(),
            });
        }
        if let Some(party) = agreement.parties().iter().find(|p| !p.has_accepted) {
            return Err(PactumError::PartyNotAccepted {
                party_id: party.party_id.to_string(),
            });
        }
        if !agreement.split_total().is_full() {
            return Err(PactumError::SplitNotClosed {
                total: agreement.split_total().value().to_string(),
            });
        }
        Ok(())
    }

    /// Completion requires an Active agreement with every milestone done
    ///
    /// Zero milestones passes vacuously.
    pub fn ensure_can_complete(&self, agreement: &CommissionAgreement) -> Result<()> {
        if agreement.status() != AgreementStatus::Active {
            return Err(PactumError::AgreementNotActive {
                agreement_id: agreement.agreement_id().to_string(),
                status: agreement.status().to_string(),
            });
        }
        let remaining = agreement
            .milestones()
            .iter()
            .filter(|m| !m.is_completed())
            .count();
        if remaining > 0 {
            return Err(PactumError::MilestonesNotCompleted {
                agreement_id: agreement.agreement_id().to_string(),
                remaining,
            });
        }
        Ok(())
    }

    /// Settlement requires no payout left pending or approved
    pub fn ensure_escrow_settled(&self, account: &EscrowAccount) -> Result<()> {
        let outstanding = account.outstanding_payouts().count();
        if outstanding > 0 {
            return Err(PactumError::EscrowNotSettled {
                escrow_account_id: account.escrow_account_id().to_string(),
                outstanding,
            });
        }
        Ok(())
    }

    /// Agreement value not yet released through completed milestones
    pub fn outstanding_value(&self, agreement: &CommissionAgreement) -> Money {
        let zero = Money::zero(agreement.currency());
        let released = agreement
            .milestones()
            .iter()
            .filter(|m| m.is_completed())
            .fold(zero, |acc, m| acc.add(m.value).unwrap_or(acc));
        agreement.total_value().subtract(released).unwrap_or(zero)
    }

    /// Pending milestones past their due date at `now`
    ///
    /// Callers drive `mark_milestone_overdue` from this list; there is no
    /// internal scheduler.
    pub fn overdue_milestones<'a>(
        &self,
        agreement: &'a CommissionAgreement,
        now: DateTime<Utc>,
    ) -> Vec<&'a Milestone> {
        agreement
            .milestones()
            .iter()
            .filter(|m| m.is_overdue_at(now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pactum_agreement::{NewMilestone, NewParty};
    use pactum_escrow::TransactionStatus;
    use pactum_types::{
        AgreementId, ApprovalTier, Currency, EscrowAccountId, IdempotencyKey, Percentage,
        TransactionId, UserId,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn usd(v: Decimal) -> Money {
        Money::new(v, Currency::usd()).unwrap()
    }

    fn active_agreement(total: Decimal) -> CommissionAgreement {
        let mut agreement = CommissionAgreement::create(
            AgreementId::new(),
            UserId::new(),
            "Deal",
            None,
            usd(total),
            None,
            Utc::now(),
        )
        .unwrap();
        let party_id = agreement
            .add_party(
                NewParty::named("Solo", Percentage::new(dec!(100)).unwrap()),
                Utc::now(),
            )
            .unwrap()
            .party_id;
        agreement.accept(party_id, Utc::now()).unwrap();
        agreement.activate(Utc::now()).unwrap();
        agreement
    }

    #[test]
    fn completion_blocked_by_unfinished_milestones() {
        let rules = AgreementRules::new();
        let mut agreement = CommissionAgreement::create(
            AgreementId::new(),
            UserId::new(),
            "Deal",
            None,
            usd(dec!(1000)),
            None,
            Utc::now(),
        )
        .unwrap();
        let due = Utc::now() + Duration::days(30);
        let first = agreement
            .add_milestone(NewMilestone::new("Phase 1", usd(dec!(400)), due), Utc::now())
            .unwrap()
            .milestone_id;
        agreement
            .add_milestone(NewMilestone::new("Phase 2", usd(dec!(600)), due), Utc::now())
            .unwrap();
        let party_id = agreement
            .add_party(
                NewParty::named("Solo", Percentage::new(dec!(100)).unwrap()),
                Utc::now(),
            )
            .unwrap()
            .party_id;
        agreement.accept(party_id, Utc::now()).unwrap();
        agreement.activate(Utc::now()).unwrap();

        let result = rules.ensure_can_complete(&agreement);
        assert!(matches!(
            result,
            Err(PactumError::MilestonesNotCompleted { remaining: 2, .. })
        ));

        agreement
            .complete_milestone(first, None, None, Utc::now())
            .unwrap();
        assert!(matches!(
            rules.ensure_can_complete(&agreement),
            Err(PactumError::MilestonesNotCompleted { remaining: 1, .. })
        ));
    }

    #[test]
    fn completion_passes_with_no_milestones() {
        let rules = AgreementRules::new();
        let agreement = active_agreement(dec!(1000));
        assert!(rules.ensure_can_complete(&agreement).is_ok());
    }

    #[test]
    fn completion_requires_active() {
        let rules = AgreementRules::new();
        let agreement = CommissionAgreement::create(
            AgreementId::new(),
            UserId::new(),
            "Deal",
            None,
            usd(dec!(1000)),
            None,
            Utc::now(),
        )
        .unwrap();
        assert!(matches!(
            rules.ensure_can_complete(&agreement),
            Err(PactumError::AgreementNotActive { .. })
        ));
    }

    #[test]
    fn activation_mirror_matches_aggregate_guards() {
        let rules = AgreementRules::new();
        let mut agreement = CommissionAgreement::create(
            AgreementId::new(),
            UserId::new(),
            "Deal",
            None,
            usd(dec!(1000)),
            None,
            Utc::now(),
        )
        .unwrap();
        assert!(matches!(
            rules.ensure_can_activate(&agreement),
            Err(PactumError::NoParties { .. })
        ));

        let party_id = agreement
            .add_party(
                NewParty::named("Solo", Percentage::new(dec!(90)).unwrap()),
                Utc::now(),
            )
            .unwrap()
            .party_id;
        assert!(matches!(
            rules.ensure_can_activate(&agreement),
            Err(PactumError::PartyNotAccepted { .. })
        ));

        agreement.accept(party_id, Utc::now()).unwrap();
        assert!(matches!(
            rules.ensure_can_activate(&agreement),
            Err(PactumError::SplitNotClosed { .. })
        ));
    }

    #[test]
    fn settlement_requires_no_outstanding_payouts() {
        let rules = AgreementRules::new();
        let mut acct = EscrowAccount::create(
            EscrowAccountId::new(),
            AgreementId::new(),
            UserId::new(),
            Currency::usd(),
            Utc::now(),
        )
        .unwrap();
        acct.register_deposit(
            TransactionId::new(),
            usd(dec!(1000)),
            None,
            TransactionStatus::Completed,
            None,
            IdempotencyKey::new("dep-seed-0001").unwrap(),
            Utc::now(),
        )
        .unwrap();
        assert!(rules.ensure_escrow_settled(&acct).is_ok());

        let txn_id = TransactionId::new();
        acct.request_payout(
            txn_id,
            None,
            usd(dec!(400)),
            None,
            ApprovalTier::Manual,
            IdempotencyKey::new("pay-settle-01").unwrap(),
            Utc::now(),
        )
        .unwrap();
        assert!(matches!(
            rules.ensure_escrow_settled(&acct),
            Err(PactumError::EscrowNotSettled { outstanding: 1, .. })
        ));

        acct.approve_payout(txn_id, UserId::new(), Utc::now())
            .unwrap();
        acct.mark_payout_executed(txn_id, Some("tr_1".into()), Utc::now())
            .unwrap();
        assert!(rules.ensure_escrow_settled(&acct).is_ok());
    }

    #[test]
    fn outstanding_value_tracks_completed_milestones() {
        let rules = AgreementRules::new();
        let mut agreement = CommissionAgreement::create(
            AgreementId::new(),
            UserId::new(),
            "Deal",
            None,
            usd(dec!(1000)),
            None,
            Utc::now(),
        )
        .unwrap();
        let due = Utc::now() + Duration::days(30);
        let first = agreement
            .add_milestone(NewMilestone::new("Phase 1", usd(dec!(400)), due), Utc::now())
            .unwrap()
            .milestone_id;
        assert_eq!(rules.outstanding_value(&agreement), usd(dec!(1000)));

        agreement
            .complete_milestone(first, None, None, Utc::now())
            .unwrap();
        assert_eq!(rules.outstanding_value(&agreement), usd(dec!(600)));
    }

    #[test]
    fn overdue_listing_ignores_completed_milestones() {
        let rules = AgreementRules::new();
        let mut agreement = CommissionAgreement::create(
            AgreementId::new(),
            UserId::new(),
            "Deal",
            None,
            usd(dec!(1000)),
            None,
            Utc::now(),
        )
        .unwrap();
        let past = Utc::now() - Duration::days(1);
        let future = Utc::now() + Duration::days(30);
        let late = agreement
            .add_milestone(NewMilestone::new("Late", usd(dec!(200)), past), Utc::now())
            .unwrap()
            .milestone_id;
        let done = agreement
            .add_milestone(NewMilestone::new("Done", usd(dec!(200)), past), Utc::now())
            .unwrap()
            .milestone_id;
        agreement
            .add_milestone(NewMilestone::new("Early", usd(dec!(200)), future), Utc::now())
            .unwrap();
        agreement
            .complete_milestone(done, None, None, Utc::now())
            .unwrap();

        let overdue = rules.overdue_milestones(&agreement, Utc::now());
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].milestone_id, late);
    }
}
