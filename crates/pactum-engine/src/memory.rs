//! In-memory repository implementations
//!
//! Backed by `HashMap` under a tokio `RwLock`. Reads hand out clones, so a
//! loaded aggregate is a private working copy until `update` writes it back
//! through the version check.

use crate::repository::{AgreementRepository, EscrowAccountRepository};
use pactum_agreement::CommissionAgreement;
use pactum_escrow::{EscrowAccount, EscrowTransaction};
use pactum_types::{AgreementId, EscrowAccountId, PactumError, PartyId, Result, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory agreement store
#[derive(Debug, Clone, Default)]
pub struct InMemoryAgreementRepository {
    agreements: Arc<RwLock<HashMap<AgreementId, CommissionAgreement>>>,
}

impl InMemoryAgreementRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AgreementRepository for InMemoryAgreementRepository {
    async fn get(&self, agreement_id: AgreementId) -> Result<CommissionAgreement> {
        self.agreements
            .read()
            .await
            .get(&agreement_id)
            .cloned()
            .ok_or_else(|| PactumError::AgreementNotFound {
                agreement_id: agreement_id.to_string(),
            })
    }

    async fn get_by_party(&self, party_id: PartyId) -> Result<CommissionAgreement> {
        self.agreements
            .read()
            .await
            .values()
            .find(|a| a.party(&party_id).is_some())
            .cloned()
            .ok_or_else(|| PactumError::PartyNotFound {
                party_id: party_id.to_string(),
            })
    }

    async fn list_by_owner(&self, owner_user_id: UserId) -> Result<Vec<CommissionAgreement>> {
        let mut agreements: Vec<CommissionAgreement> = self
            .agreements
            .read()
            .await
            .values()
            .filter(|a| a.owner_user_id() == owner_user_id)
            .cloned()
            .collect();
        agreements.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(agreements)
    }

    async fn add(&self, agreement: &CommissionAgreement) -> Result<()> {
        self.agreements
            .write()
            .await
            .insert(agreement.agreement_id(), agreement.clone());
        Ok(())
    }

    async fn update(&self, agreement: &CommissionAgreement) -> Result<CommissionAgreement> {
        let mut agreements = self.agreements.write().await;
        let stored = agreements.get(&agreement.agreement_id()).ok_or_else(|| {
            PactumError::AgreementNotFound {
                agreement_id: agreement.agreement_id().to_string(),
            }
        })?;
        if stored.version() != agreement.version() {
            return Err(PactumError::ConcurrencyConflict {
                aggregate_id: agreement.agreement_id().to_string(),
                expected: agreement.version(),
                actual: stored.version(),
            });
        }

        let mut next = agreement.clone();
        next.bump_version();
        agreements.insert(next.agreement_id(), next.clone());
        Ok(next)
    }
}

/// In-memory escrow account store
#[derive(Debug, Clone, Default)]
pub struct InMemoryEscrowAccountRepository {
    accounts: Arc<RwLock<HashMap<EscrowAccountId, EscrowAccount>>>,
}

impl InMemoryEscrowAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EscrowAccountRepository for InMemoryEscrowAccountRepository {
    async fn get(&self, escrow_account_id: EscrowAccountId) -> Result<EscrowAccount> {
        self.accounts
            .read()
            .await
            .get(&escrow_account_id)
            .cloned()
            .ok_or_else(|| PactumError::EscrowAccountNotFound {
                escrow_account_id: escrow_account_id.to_string(),
            })
    }

    async fn get_by_agreement(&self, agreement_id: AgreementId) -> Result<EscrowAccount> {
        self.accounts
            .read()
            .await
            .values()
            .find(|a| a.agreement_id() == agreement_id)
            .cloned()
            .ok_or_else(|| PactumError::EscrowAccountNotFound {
                escrow_account_id: format!("for agreement {}", agreement_id),
            })
    }

    async fn list_transactions(
        &self,
        escrow_account_id: EscrowAccountId,
    ) -> Result<Vec<EscrowTransaction>> {
        let accounts = self.accounts.read().await;
        let account = accounts.get(&escrow_account_id).ok_or_else(|| {
            PactumError::EscrowAccountNotFound {
                escrow_account_id: escrow_account_id.to_string(),
            }
        })?;
        // Ledger order is chronological; newest first for callers
        Ok(account.transactions().iter().rev().cloned().collect())
    }

    async fn add(&self, account: &EscrowAccount) -> Result<()> {
        self.accounts
            .write()
            .await
            .insert(account.escrow_account_id(), account.clone());
        Ok(())
    }

    async fn update(&self, account: &EscrowAccount) -> Result<EscrowAccount> {
        let mut accounts = self.accounts.write().await;
        let stored = accounts.get(&account.escrow_account_id()).ok_or_else(|| {
            PactumError::EscrowAccountNotFound {
                escrow_account_id: account.escrow_account_id().to_string(),
            }
        })?;
        if stored.version() != account.version() {
            return Err(PactumError::ConcurrencyConflict {
                aggregate_id: account.escrow_account_id().to_string(),
                expected: account.version(),
                actual: stored.version(),
            });
        }

        let mut next = account.clone();
        next.bump_version();
        accounts.insert(next.escrow_account_id(), next.clone());
        Ok(next)
    }

    async fn add_transaction(
        &self,
        escrow_account_id: EscrowAccountId,
        transaction: &EscrowTransaction,
    ) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts.get_mut(&escrow_account_id).ok_or_else(|| {
            PactumError::EscrowAccountNotFound {
                escrow_account_id: escrow_account_id.to_string(),
            }
        })?;
        // The aggregate already carries the row after `update`; nothing to do
        // here unless this store ever receives rows out of band
        if account.transaction(&transaction.transaction_id).is_none() {
            return Err(PactumError::TransactionNotFound {
                transaction_id: transaction.transaction_id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pactum_types::{Currency, Money, PactumError, UserId};
    use rust_decimal_macros::dec;

    fn account() -> EscrowAccount {
        EscrowAccount::create(
            EscrowAccountId::new(),
            AgreementId::new(),
            UserId::new(),
            Currency::usd(),
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn update_rejects_a_stale_version() {
        let repo = InMemoryEscrowAccountRepository::new();
        let mut created = account();
        created.take_events();
        repo.add(&created).await.unwrap();

        let first = repo.get(created.escrow_account_id()).await.unwrap();
        let second = repo.get(created.escrow_account_id()).await.unwrap();

        repo.update(&first).await.unwrap();
        let err = repo.update(&second).await.unwrap_err();
        assert!(matches!(err, PactumError::ConcurrencyConflict { .. }));
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn update_bumps_the_stored_version() {
        let repo = InMemoryEscrowAccountRepository::new();
        let mut created = account();
        created.take_events();
        repo.add(&created).await.unwrap();

        let loaded = repo.get(created.escrow_account_id()).await.unwrap();
        let stored = repo.update(&loaded).await.unwrap();
        assert_eq!(stored.version(), loaded.version() + 1);

        let reloaded = repo.get(created.escrow_account_id()).await.unwrap();
        assert_eq!(reloaded.version(), stored.version());
    }

    #[tokio::test]
    async fn transactions_list_newest_first() {
        let repo = InMemoryEscrowAccountRepository::new();
        let mut acct = account();
        acct.take_events();

        let now = Utc::now();
        let first = pactum_types::TransactionId::new();
        let second = pactum_types::TransactionId::new();
        acct.register_deposit(
            first,
            Money::new(dec!(100), Currency::usd()).unwrap(),
            None,
            pactum_escrow::TransactionStatus::Completed,
            None,
            pactum_types::IdempotencyKey::new("dep-key-001").unwrap(),
            now,
        )
        .unwrap();
        acct.register_deposit(
            second,
            Money::new(dec!(200), Currency::usd()).unwrap(),
            None,
            pactum_escrow::TransactionStatus::Completed,
            None,
            pactum_types::IdempotencyKey::new("dep-key-002").unwrap(),
            now + chrono::Duration::seconds(5),
        )
        .unwrap();
        acct.take_events();
        repo.add(&acct).await.unwrap();

        let listed = repo.list_transactions(acct.escrow_account_id()).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].transaction_id, second);
        assert_eq!(listed[1].transaction_id, first);
    }

    #[tokio::test]
    async fn missing_account_is_reported() {
        let repo = InMemoryEscrowAccountRepository::new();
        let err = repo.get(EscrowAccountId::new()).await.unwrap_err();
        assert_eq!(err.error_code(), "ESCROW_ACCOUNT_NOT_FOUND");
    }
}
