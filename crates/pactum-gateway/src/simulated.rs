//! Deterministic in-process gateway for tests and demos
//!
//! References are sequential, so assertions can predict them. Failure modes
//! are switched through [`SimulatedGatewayConfig`]: a declined transfer is
//! reported through the normal result status, an outage as a retriable
//! error.

use crate::{
    GatewayError, GatewayResult, PaymentGateway, PaymentIntent, PayoutExecution,
    SplitPayoutExecution, SplitTransfer, WebhookEvent,
};
use pactum_types::{EscrowAccountId, Money, TransactionId, UserId};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Behavior switches for the simulated processor
#[derive(Debug, Clone)]
pub struct SimulatedGatewayConfig {
    /// Report every transfer as failed instead of paid
    pub fail_transfers: bool,
    /// Refuse every call as a transport outage
    pub unavailable: bool,
    /// Secret expected in webhook signatures
    pub webhook_secret: String,
}

impl Default for SimulatedGatewayConfig {
    fn default() -> Self {
        Self {
            fail_transfers: false,
            unavailable: false,
            webhook_secret: "whsec_simulated".to_string(),
        }
    }
}

/// A deposit intent opened through the simulated processor
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedIntent {
    pub payment_intent_id: String,
    pub escrow_account_id: EscrowAccountId,
    pub amount: Money,
}

/// An outbound transfer executed through the simulated processor
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTransfer {
    pub transfer_id: String,
    pub destination_account_ref: String,
    pub amount: Money,
}

#[derive(Debug, Default)]
struct GatewayState {
    intent_seq: u64,
    transfer_seq: u64,
    account_seq: u64,
    intents: Vec<RecordedIntent>,
    transfers: Vec<RecordedTransfer>,
}

/// In-process [`PaymentGateway`] implementation
pub struct SimulatedGateway {
    config: SimulatedGatewayConfig,
    state: Arc<RwLock<GatewayState>>,
}

impl SimulatedGateway {
    pub fn new(config: SimulatedGatewayConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(GatewayState::default())),
        }
    }

    /// Every deposit intent opened so far, in order
    pub async fn recorded_intents(&self) -> Vec<RecordedIntent> {
        self.state.read().await.intents.clone()
    }

    /// Every transfer executed so far, in order
    pub async fn recorded_transfers(&self) -> Vec<RecordedTransfer> {
        self.state.read().await.transfers.clone()
    }

    fn ensure_available(&self) -> GatewayResult<()> {
        if self.config.unavailable {
            return Err(GatewayError::unavailable("simulated outage"));
        }
        Ok(())
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(SimulatedGatewayConfig::default())
    }
}

#[async_trait::async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn create_escrow_deposit_intent(
        &self,
        escrow_account_id: EscrowAccountId,
        amount: Money,
        description: Option<&str>,
    ) -> GatewayResult<PaymentIntent> {
        self.ensure_available()?;
        if !amount.is_positive() {
            return Err(GatewayError::Declined {
                code: "amount_too_small".to_string(),
                message: format!("cannot charge {}", amount),
            });
        }

        let mut state = self.state.write().await;
        state.intent_seq += 1;
        let payment_intent_id = format!("pi_simulated_{:06}", state.intent_seq);
        let client_secret = format!("{}_secret", payment_intent_id);
        state.intents.push(RecordedIntent {
            payment_intent_id: payment_intent_id.clone(),
            escrow_account_id,
            amount,
        });

        info!(
            "Deposit intent {} opened for {} on {} ({})",
            payment_intent_id,
            amount,
            escrow_account_id,
            description.unwrap_or("no description")
        );
        Ok(PaymentIntent {
            payment_intent_id,
            client_secret,
        })
    }

    async fn execute_escrow_payout(
        &self,
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        amount: Money,
        destination_account_ref: &str,
    ) -> GatewayResult<PayoutExecution> {
        self.ensure_available()?;
        if destination_account_ref.trim().is_empty() {
            return Err(GatewayError::Declined {
                code: "invalid_destination".to_string(),
                message: "destination account reference is empty".to_string(),
            });
        }
        if self.config.fail_transfers {
            warn!(
                "Transfer of {} for payout {} on {} failed (simulated)",
                amount, transaction_id, escrow_account_id
            );
            return Ok(PayoutExecution {
                status: "failed".to_string(),
                transfer_id: None,
                failure_reason: Some("simulated transfer failure".to_string()),
            });
        }

        let mut state = self.state.write().await;
        state.transfer_seq += 1;
        let transfer_id = format!("tr_simulated_{:06}", state.transfer_seq);
        state.transfers.push(RecordedTransfer {
            transfer_id: transfer_id.clone(),
            destination_account_ref: destination_account_ref.to_string(),
            amount,
        });

        info!(
            "Transfer {} of {} to {} for payout {}",
            transfer_id, amount, destination_account_ref, transaction_id
        );
        Ok(PayoutExecution {
            status: "paid".to_string(),
            transfer_id: Some(transfer_id),
            failure_reason: None,
        })
    }

    async fn execute_split_payout(
        &self,
        source_account_ref: Option<&str>,
        transfers: &[SplitTransfer],
    ) -> GatewayResult<SplitPayoutExecution> {
        self.ensure_available()?;
        if transfers.is_empty() {
            return Err(GatewayError::Declined {
                code: "no_transfers".to_string(),
                message: "split payout requires at least one transfer".to_string(),
            });
        }
        if self.config.fail_transfers {
            warn!("Split payout of {} legs failed (simulated)", transfers.len());
            return Ok(SplitPayoutExecution {
                status: "failed".to_string(),
                transfer_ids: Vec::new(),
                failure_reason: Some("simulated transfer failure".to_string()),
            });
        }

        let mut state = self.state.write().await;
        let mut transfer_ids = Vec::with_capacity(transfers.len());
        for leg in transfers {
            state.transfer_seq += 1;
            let transfer_id = format!("tr_simulated_{:06}", state.transfer_seq);
            state.transfers.push(RecordedTransfer {
                transfer_id: transfer_id.clone(),
                destination_account_ref: leg.destination_account_ref.clone(),
                amount: leg.amount,
            });
            transfer_ids.push(transfer_id);
        }

        info!(
            "Split payout executed: {} legs from {}",
            transfer_ids.len(),
            source_account_ref.unwrap_or("platform balance")
        );
        Ok(SplitPayoutExecution {
            status: "paid".to_string(),
            transfer_ids,
            failure_reason: None,
        })
    }

    async fn connect_account(
        &self,
        owner_user_id: UserId,
        authorization_code: &str,
    ) -> GatewayResult<String> {
        self.ensure_available()?;
        if authorization_code.trim().is_empty() {
            return Err(GatewayError::Declined {
                code: "invalid_grant".to_string(),
                message: "authorization code is empty".to_string(),
            });
        }

        let mut state = self.state.write().await;
        state.account_seq += 1;
        let account_ref = format!("acct_simulated_{:06}", state.account_seq);
        info!("Connected account {} for user {}", account_ref, owner_user_id);
        Ok(account_ref)
    }

    async fn handle_webhook(&self, payload: &str, signature: &str) -> GatewayResult<WebhookEvent> {
        if signature != self.config.webhook_secret {
            return Err(GatewayError::invalid_webhook("signature mismatch"));
        }
        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| GatewayError::invalid_webhook(format!("malformed payload: {}", e)))?;
        let event_type = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::invalid_webhook("missing event type"))?;

        match event_type {
            "escrow.deposit_succeeded" => {
                let escrow_account_id = EscrowAccountId::parse(data_str(&value, "escrow_account_id")?)
                    .map_err(|_| GatewayError::invalid_webhook("bad escrow_account_id"))?;
                let payment_reference = data_str(&value, "payment_reference")?.to_string();
                Ok(WebhookEvent::DepositSucceeded {
                    escrow_account_id,
                    payment_reference,
                })
            }
            "escrow.payout_settled" => {
                let escrow_account_id = EscrowAccountId::parse(data_str(&value, "escrow_account_id")?)
                    .map_err(|_| GatewayError::invalid_webhook("bad escrow_account_id"))?;
                let transaction_id = TransactionId::parse(data_str(&value, "transaction_id")?)
                    .map_err(|_| GatewayError::invalid_webhook("bad transaction_id"))?;
                let transfer_reference = value
                    .get("data")
                    .and_then(|d| d.get("transfer_reference"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());
                Ok(WebhookEvent::PayoutSettled {
                    escrow_account_id,
                    transaction_id,
                    transfer_reference,
                })
            }
            other => Ok(WebhookEvent::Unrecognized {
                event_type: other.to_string(),
            }),
        }
    }
}

fn data_str<'a>(value: &'a serde_json::Value, field: &str) -> GatewayResult<&'a str> {
    value
        .get("data")
        .and_then(|d| d.get(field))
        .and_then(|v| v.as_str())
        .ok_or_else(|| GatewayError::invalid_webhook(format!("missing field: {}", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pactum_types::Currency;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn usd(v: rust_decimal::Decimal) -> Money {
        Money::new(v, Currency::usd()).unwrap()
    }

    #[tokio::test]
    async fn intent_references_are_sequential() {
        let gateway = SimulatedGateway::default();
        let first = gateway
            .create_escrow_deposit_intent(EscrowAccountId::new(), usd(dec!(100)), None)
            .await
            .unwrap();
        let second = gateway
            .create_escrow_deposit_intent(EscrowAccountId::new(), usd(dec!(200)), None)
            .await
            .unwrap();

        assert_eq!(first.payment_intent_id, "pi_simulated_000001");
        assert_eq!(second.payment_intent_id, "pi_simulated_000002");
        assert_eq!(gateway.recorded_intents().await.len(), 2);
    }

    #[tokio::test]
    async fn payout_execution_records_transfer() {
        let gateway = SimulatedGateway::default();
        let exec = gateway
            .execute_escrow_payout(
                EscrowAccountId::new(),
                TransactionId::new(),
                usd(dec!(500)),
                "acct_party_1",
            )
            .await
            .unwrap();

        assert!(exec.is_settled());
        assert_eq!(exec.transfer_id.as_deref(), Some("tr_simulated_000001"));

        let transfers = gateway.recorded_transfers().await;
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].destination_account_ref, "acct_party_1");
        assert_eq!(transfers[0].amount, usd(dec!(500)));
    }

    #[tokio::test]
    async fn failing_gateway_reports_failed_status() {
        let gateway = SimulatedGateway::new(SimulatedGatewayConfig {
            fail_transfers: true,
            ..Default::default()
        });
        let exec = gateway
            .execute_escrow_payout(
                EscrowAccountId::new(),
                TransactionId::new(),
                usd(dec!(500)),
                "acct_party_1",
            )
            .await
            .unwrap();

        assert!(exec.is_failed());
        assert!(exec.transfer_id.is_none());
        assert!(gateway.recorded_transfers().await.is_empty());
    }

    #[tokio::test]
    async fn outage_is_a_retriable_error() {
        let gateway = SimulatedGateway::new(SimulatedGatewayConfig {
            unavailable: true,
            ..Default::default()
        });
        let err = gateway
            .create_escrow_deposit_intent(EscrowAccountId::new(), usd(dec!(100)), None)
            .await
            .unwrap_err();
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn split_payout_issues_one_transfer_per_leg() {
        let gateway = SimulatedGateway::default();
        let legs = vec![
            SplitTransfer {
                destination_account_ref: "acct_a".to_string(),
                amount: usd(dec!(600)),
            },
            SplitTransfer {
                destination_account_ref: "acct_b".to_string(),
                amount: usd(dec!(400)),
            },
        ];
        let exec = gateway
            .execute_split_payout(Some("acct_source"), &legs)
            .await
            .unwrap();

        assert!(exec.is_settled());
        assert_eq!(exec.transfer_ids.len(), 2);
        assert_eq!(gateway.recorded_transfers().await.len(), 2);
    }

    #[tokio::test]
    async fn webhook_deposit_roundtrip() {
        let gateway = SimulatedGateway::default();
        let escrow_account_id = EscrowAccountId::new();
        let payload = json!({
            "type": "escrow.deposit_succeeded",
            "data": {
                "escrow_account_id": escrow_account_id.to_string(),
                "payment_reference": "pi_simulated_000001",
            }
        })
        .to_string();

        let event = gateway
            .handle_webhook(&payload, "whsec_simulated")
            .await
            .unwrap();
        assert_eq!(
            event,
            WebhookEvent::DepositSucceeded {
                escrow_account_id,
                payment_reference: "pi_simulated_000001".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn webhook_rejects_bad_signature() {
        let gateway = SimulatedGateway::default();
        let err = gateway
            .handle_webhook("{}", "whsec_wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidWebhook { .. }));
    }

    #[tokio::test]
    async fn webhook_unknown_type_is_unrecognized() {
        let gateway = SimulatedGateway::default();
        let payload = json!({ "type": "invoice.created", "data": {} }).to_string();
        let event = gateway
            .handle_webhook(&payload, "whsec_simulated")
            .await
            .unwrap();
        assert_eq!(
            event,
            WebhookEvent::Unrecognized {
                event_type: "invoice.created".to_string(),
            }
        );
    }
}
