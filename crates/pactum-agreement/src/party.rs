//! Agreement parties
//!
//! A party is a participant entitled to a percentage split of the agreement
//! value. Identity fields are fixed once the party is added; only acceptance
//! and payout-account linkage mutate afterwards, and only through the
//! aggregate root.

use chrono::{DateTime, Utc};
use pactum_types::{CompanyId, ContactId, PartyId, Percentage};
use serde::{Deserialize, Serialize};

/// Role a party plays in the agreement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartyRole {
    /// The agent performing the commissioned work
    #[default]
    Agent,
    /// An intermediary broker
    Broker,
    /// The source of the referral
    Referrer,
    /// Anything else
    Other,
}

/// Input for adding a party to a draft agreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewParty {
    pub party_id: PartyId,
    pub contact_id: Option<ContactId>,
    pub company_id: Option<CompanyId>,
    pub party_name: String,
    pub email: Option<String>,
    pub split: Percentage,
    pub role: PartyRole,
    pub payout_account_id: Option<String>,
}

impl NewParty {
    /// A party with just a name and a split; everything else defaulted
    pub fn named(party_name: impl Into<String>, split: Percentage) -> Self {
        Self {
            party_id: PartyId::new(),
            contact_id: None,
            company_id: None,
            party_name: party_name.into(),
            email: None,
            split,
            role: PartyRole::default(),
            payout_account_id: None,
        }
    }
}

/// A participant on a commission agreement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementParty {
    pub party_id: PartyId,
    pub contact_id: Option<ContactId>,
    pub company_id: Option<CompanyId>,
    pub party_name: String,
    pub email: Option<String>,
    pub split_percentage: Percentage,
    pub role: PartyRole,
    /// External payout destination (gateway account reference)
    pub payout_account_id: Option<String>,
    pub payout_account_linked_at: Option<DateTime<Utc>>,
    pub has_accepted: bool,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AgreementParty {
    pub(crate) fn from_input(input: NewParty, now: DateTime<Utc>) -> Self {
        Self {
            party_id: input.party_id,
            contact_id: input.contact_id,
            company_id: input.company_id,
            party_name: input.party_name,
            email: input.email,
            split_percentage: input.split,
            role: input.role,
            payout_account_linked_at: input.payout_account_id.as_ref().map(|_| now),
            payout_account_id: input.payout_account_id,
            has_accepted: false,
            accepted_at: None,
            created_at: now,
        }
    }

    /// Whether this party can receive direct gateway transfers
    pub fn can_receive_payouts(&self) -> bool {
        self.payout_account_id.is_some()
    }
}
