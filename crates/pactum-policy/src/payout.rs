//! Payout policy: coverage, approval tiers, split computation

use pactum_agreement::{CommissionAgreement, Milestone};
use pactum_escrow::EscrowAccount;
use pactum_types::{ApprovalTier, Money, PactumError, PartyId, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Approval thresholds as fractions of the agreement total
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoutPolicyConfig {
    /// Payouts at or below this fraction auto-approve
    pub auto_approve_max: Decimal,
    /// Payouts at or above this fraction escalate
    pub escalation_min: Decimal,
}

impl Default for PayoutPolicyConfig {
    fn default() -> Self {
        Self {
            auto_approve_max: dec!(0.10),
            escalation_min: dec!(0.50),
        }
    }
}

/// One party's share of a split payout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutSplit {
    pub party_id: PartyId,
    /// The party's linked external payout destination
    pub account_ref: String,
    pub share: Money,
}

/// Balance coverage and approval-tier classification for payouts
#[derive(Debug, Clone, Default)]
pub struct PayoutPolicy {
    config: PayoutPolicyConfig,
}

impl PayoutPolicy {
    pub fn new(config: PayoutPolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PayoutPolicyConfig {
        &self.config
    }

    /// Advisory coverage check: amount must fit the available balance
    ///
    /// Pending payouts reserve availability, so a request racing a pending
    /// one fails here even though the raw balance would cover it.
    pub fn ensure_escrow_coverage(&self, account: &EscrowAccount, amount: Money) -> Result<()> {
        if amount.currency() != account.currency() {
            return Err(PactumError::CurrencyMismatch {
                expected: account.currency().code().to_string(),
                actual: amount.currency().code().to_string(),
            });
        }
        let available = account.available_balance();
        if amount > available {
            return Err(PactumError::InsufficientEscrowBalance {
                escrow_account_id: account.escrow_account_id().to_string(),
                requested: amount.to_string(),
                available: available.to_string(),
            });
        }
        Ok(())
    }

    /// Classify a payout by its fraction of the agreement total
    ///
    /// Pure and deterministic: identical inputs always yield the same tier.
    pub fn determine_approval_tier(
        &self,
        agreement: &CommissionAgreement,
        amount: Money,
    ) -> Result<ApprovalTier> {
        if amount.currency() != agreement.currency() {
            return Err(PactumError::CurrencyMismatch {
                expected: agreement.currency().code().to_string(),
                actual: amount.currency().code().to_string(),
            });
        }
        if !amount.is_positive() {
            return Err(PactumError::invalid_amount("payout amount must be positive"));
        }
        let total = agreement.total_value();
        if !total.is_positive() {
            return Err(PactumError::invalid_amount(
                "agreement total value must be positive",
            ));
        }
        let ratio = amount
            .amount()
            .checked_div(total.amount())
            .ok_or(PactumError::AmountOverflow)?;

        Ok(if ratio <= self.config.auto_approve_max {
            ApprovalTier::Automatic
        } else if ratio >= self.config.escalation_min {
            ApprovalTier::Escalated
        } else {
            ApprovalTier::Manual
        })
    }

    /// A milestone-backed payout requires a completed milestone on this
    /// agreement and an amount within the milestone value.
    pub fn ensure_milestone_eligible_for_payout(
        &self,
        agreement: &CommissionAgreement,
        milestone: &Milestone,
        amount: Money,
    ) -> Result<()> {
        if milestone.agreement_id != agreement.agreement_id() {
            return Err(PactumError::MilestoneNotOnAgreement {
                milestone_id: milestone.milestone_id.to_string(),
                agreement_id: agreement.agreement_id().to_string(),
            });
        }
        if !milestone.is_completed() {
            return Err(PactumError::MilestoneNotCompleted {
                milestone_id: milestone.milestone_id.to_string(),
            });
        }
        if amount.currency() != milestone.value.currency() {
            return Err(PactumError::CurrencyMismatch {
                expected: milestone.value.currency().code().to_string(),
                actual: amount.currency().code().to_string(),
            });
        }
        if amount > milestone.value {
            return Err(PactumError::PayoutExceedsMilestone {
                milestone_id: milestone.milestone_id.to_string(),
                requested: amount.to_string(),
                value: milestone.value.to_string(),
            });
        }
        Ok(())
    }

    /// Every party needs a linked payout account before a split executes
    pub fn ensure_all_parties_linked(&self, agreement: &CommissionAgreement) -> Result<()> {
        match agreement.parties().iter().find(|p| !p.can_receive_payouts()) {
            Some(party) => Err(PactumError::PayoutAccountMissing {
                party_id: party.party_id.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Divide an amount across all parties by their split percentages
    ///
    /// Shares are rounded to 2 decimal places; the last party absorbs the
    /// rounding remainder so the shares always sum to exactly `amount`.
    pub fn payout_splits(
        &self,
        agreement: &CommissionAgreement,
        amount: Money,
    ) -> Result<Vec<PayoutSplit>> {
        if agreement.parties().is_empty() {
            return Err(PactumError::NoParties {
                agreement_id: agreement.agreement_id().to_string(),
            });
        }
        if amount.currency() != agreement.currency() {
            return Err(PactumError::CurrencyMismatch {
                expected: agreement.currency().code().to_string(),
                actual: amount.currency().code().to_string(),
            });
        }
        if !amount.is_positive() {
            return Err(PactumError::invalid_amount("split amount must be positive"));
        }

        let last = agreement.parties().len() - 1;
        let mut allocated = Money::zero(amount.currency());
        let mut splits = Vec::with_capacity(agreement.parties().len());
        for (i, party) in agreement.parties().iter().enumerate() {
            let account_ref = party.payout_account_id.clone().ok_or_else(|| {
                PactumError::PayoutAccountMissing {
                    party_id: party.party_id.to_string(),
                }
            })?;
            let share = if i == last {
                amount.subtract(allocated)?
            } else {
                let share = party.split_percentage.of(amount)?.round_dp(2);
                allocated = allocated.add(share)?;
                share
            };
            splits.push(PayoutSplit {
                party_id: party.party_id,
                account_ref,
                share,
            });
        }
        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pactum_agreement::{NewMilestone, NewParty};
    use pactum_escrow::TransactionStatus;
    use pactum_types::{
        AgreementId, Currency, EscrowAccountId, IdempotencyKey, Percentage, TransactionId, UserId,
    };

    fn usd(v: Decimal) -> Money {
        Money::new(v, Currency::usd()).unwrap()
    }

    fn pct(v: Decimal) -> Percentage {
        Percentage::new(v).unwrap()
    }

    fn agreement(total: Decimal) -> CommissionAgreement {
        CommissionAgreement::create(
            AgreementId::new(),
            UserId::new(),
            "Deal",
            None,
            usd(total),
            None,
            Utc::now(),
        )
        .unwrap()
    }

    fn linked_party(name: &str, split: Decimal, account: &str) -> NewParty {
        let mut party = NewParty::named(name, pct(split));
        party.payout_account_id = Some(account.to_string());
        party
    }

    fn funded_account(amount: Decimal) -> EscrowAccount {
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
            usd(amount),
            None,
            TransactionStatus::Completed,
            None,
            IdempotencyKey::new("dep-seed-0001").unwrap(),
            Utc::now(),
        )
        .unwrap();
        acct
    }

    #[test]
    fn tier_boundaries_follow_configured_thresholds() {
        let policy = PayoutPolicy::default();
        let agreement = agreement(dec!(1000));

        assert_eq!(
            policy
                .determine_approval_tier(&agreement, usd(dec!(100)))
                .unwrap(),
            ApprovalTier::Automatic
        );
        assert_eq!(
            policy
                .determine_approval_tier(&agreement, usd(dec!(100.01)))
                .unwrap(),
            ApprovalTier::Manual
        );
        assert_eq!(
            policy
                .determine_approval_tier(&agreement, usd(dec!(499.99)))
                .unwrap(),
            ApprovalTier::Manual
        );
        assert_eq!(
            policy
                .determine_approval_tier(&agreement, usd(dec!(500)))
                .unwrap(),
            ApprovalTier::Escalated
        );
    }

    #[test]
    fn tier_is_deterministic() {
        let policy = PayoutPolicy::default();
        let agreement = agreement(dec!(1000));
        let first = policy
            .determine_approval_tier(&agreement, usd(dec!(250)))
            .unwrap();
        let second = policy
            .determine_approval_tier(&agreement, usd(dec!(250)))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn tier_rejects_currency_mismatch() {
        let policy = PayoutPolicy::default();
        let agreement = agreement(dec!(1000));
        let eur = Money::new(dec!(100), Currency::eur()).unwrap();
        assert!(matches!(
            policy.determine_approval_tier(&agreement, eur),
            Err(PactumError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn custom_thresholds_apply() {
        let policy = PayoutPolicy::new(PayoutPolicyConfig {
            auto_approve_max: dec!(0.25),
            escalation_min: dec!(0.75),
        });
        let agreement = agreement(dec!(1000));
        assert_eq!(
            policy
                .determine_approval_tier(&agreement, usd(dec!(250)))
                .unwrap(),
            ApprovalTier::Automatic
        );
        assert_eq!(
            policy
                .determine_approval_tier(&agreement, usd(dec!(600)))
                .unwrap(),
            ApprovalTier::Manual
        );
        assert_eq!(
            policy
                .determine_approval_tier(&agreement, usd(dec!(750)))
                .unwrap(),
            ApprovalTier::Escalated
        );
    }

    #[test]
    fn coverage_respects_pending_reservations() {
        let policy = PayoutPolicy::default();
        let mut acct = funded_account(dec!(1000));
        acct.request_payout(
            TransactionId::new(),
            None,
            usd(dec!(700)),
            None,
            ApprovalTier::Manual,
            IdempotencyKey::new("pay-res-0001").unwrap(),
            Utc::now(),
        )
        .unwrap();

        assert!(policy.ensure_escrow_coverage(&acct, usd(dec!(300))).is_ok());
        assert!(matches!(
            policy.ensure_escrow_coverage(&acct, usd(dec!(301))),
            Err(PactumError::InsufficientEscrowBalance { .. })
        ));
    }

    #[test]
    fn splits_sum_exactly_with_remainder_on_last_party() {
        let policy = PayoutPolicy::default();
        let mut agreement = agreement(dec!(10000));
        agreement
            .add_party(linked_party("A", dec!(33.33), "acct_a"), Utc::now())
            .unwrap();
        agreement
            .add_party(linked_party("B", dec!(33.33), "acct_b"), Utc::now())
            .unwrap();
        agreement
            .add_party(linked_party("C", dec!(33.34), "acct_c"), Utc::now())
            .unwrap();

        let splits = policy.payout_splits(&agreement, usd(dec!(100))).unwrap();
        assert_eq!(splits.len(), 3);
        assert_eq!(splits[0].share, usd(dec!(33.33)));
        assert_eq!(splits[1].share, usd(dec!(33.33)));
        assert_eq!(splits[2].share, usd(dec!(33.34)));

        let total = splits
            .iter()
            .fold(Money::zero(Currency::usd()), |acc, s| {
                acc.add(s.share).unwrap()
            });
        assert_eq!(total, usd(dec!(100)));
    }

    #[test]
    fn splits_require_every_party_linked() {
        let policy = PayoutPolicy::default();
        let mut agreement = agreement(dec!(10000));
        agreement
            .add_party(linked_party("A", dec!(60), "acct_a"), Utc::now())
            .unwrap();
        agreement
            .add_party(NewParty::named("B", pct(dec!(40))), Utc::now())
            .unwrap();

        assert!(matches!(
            policy.payout_splits(&agreement, usd(dec!(100))),
            Err(PactumError::PayoutAccountMissing { .. })
        ));
        assert!(matches!(
            policy.ensure_all_parties_linked(&agreement),
            Err(PactumError::PayoutAccountMissing { .. })
        ));
    }

    #[test]
    fn milestone_payout_requires_completion_and_bound() {
        let policy = PayoutPolicy::default();
        let mut agreement = agreement(dec!(1000));
        let milestone_id = agreement
            .add_milestone(
                NewMilestone::new("Phase 1", usd(dec!(400)), Utc::now()),
                Utc::now(),
            )
            .unwrap()
            .milestone_id;

        let milestone = agreement.milestone(&milestone_id).unwrap().clone();
        assert!(matches!(
            policy.ensure_milestone_eligible_for_payout(&agreement, &milestone, usd(dec!(100))),
            Err(PactumError::MilestoneNotCompleted { .. })
        ));

        agreement
            .complete_milestone(milestone_id, None, None, Utc::now())
            .unwrap();
        let milestone = agreement.milestone(&milestone_id).unwrap().clone();
        assert!(policy
            .ensure_milestone_eligible_for_payout(&agreement, &milestone, usd(dec!(400)))
            .is_ok());
        assert!(matches!(
            policy.ensure_milestone_eligible_for_payout(&agreement, &milestone, usd(dec!(400.01))),
            Err(PactumError::PayoutExceedsMilestone { .. })
        ));
    }

    #[test]
    fn milestone_from_another_agreement_is_rejected() {
        let policy = PayoutPolicy::default();
        let agreement_a = agreement(dec!(1000));
        let mut agreement_b = agreement(dec!(1000));
        let milestone_id = agreement_b
            .add_milestone(
                NewMilestone::new("Elsewhere", usd(dec!(400)), Utc::now()),
                Utc::now(),
            )
            .unwrap()
            .milestone_id;
        agreement_b
            .complete_milestone(milestone_id, None, None, Utc::now())
            .unwrap();

        let foreign = agreement_b.milestone(&milestone_id).unwrap();
        assert!(matches!(
            policy.ensure_milestone_eligible_for_payout(&agreement_a, foreign, usd(dec!(100))),
            Err(PactumError::MilestoneNotOnAgreement { .. })
        ));
    }
}
