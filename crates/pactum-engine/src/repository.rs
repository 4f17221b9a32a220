//! Repository contracts
//!
//! Aggregates are loaded and stored whole. `update` is version-checked: the
//! caller hands back the aggregate at the version it loaded, the store
//! rejects the write with [`PactumError::ConcurrencyConflict`] if someone
//! else got there first, and bumps the version on success. Combined with the
//! in-aggregate balance guards this makes a double-spend impossible even
//! under concurrent commands.

use pactum_agreement::CommissionAgreement;
use pactum_escrow::{EscrowAccount, EscrowTransaction};
use pactum_types::{AgreementId, EscrowAccountId, PartyId, Result, UserId};

/// Storage for commission agreements
#[async_trait::async_trait]
pub trait AgreementRepository: Send + Sync {
    async fn get(&self, agreement_id: AgreementId) -> Result<CommissionAgreement>;

    /// The agreement a party belongs to
    async fn get_by_party(&self, party_id: PartyId) -> Result<CommissionAgreement>;

    /// All agreements owned by a user, newest first
    async fn list_by_owner(&self, owner_user_id: UserId) -> Result<Vec<CommissionAgreement>>;

    async fn add(&self, agreement: &CommissionAgreement) -> Result<()>;

    /// Version-checked write; returns the stored aggregate at its new version
    async fn update(&self, agreement: &CommissionAgreement) -> Result<CommissionAgreement>;
}

/// Storage for escrow accounts and their transaction ledgers
#[async_trait::async_trait]
pub trait EscrowAccountRepository: Send + Sync {
    async fn get(&self, escrow_account_id: EscrowAccountId) -> Result<EscrowAccount>;

    /// The account backing an agreement (1:1 binding)
    async fn get_by_agreement(&self, agreement_id: AgreementId) -> Result<EscrowAccount>;

    /// Ledger entries for an account, newest first
    async fn list_transactions(
        &self,
        escrow_account_id: EscrowAccountId,
    ) -> Result<Vec<EscrowTransaction>>;

    async fn add(&self, account: &EscrowAccount) -> Result<()>;

    /// Version-checked write; returns the stored aggregate at its new version
    async fn update(&self, account: &EscrowAccount) -> Result<EscrowAccount>;

    /// Record a new ledger row for row-oriented stores
    ///
    /// `update` already persists the whole aggregate; stores that keep
    /// transactions in their own table use this hook to write the row.
    async fn add_transaction(
        &self,
        escrow_account_id: EscrowAccountId,
        transaction: &EscrowTransaction,
    ) -> Result<()>;
}
