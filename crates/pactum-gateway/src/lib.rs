//! Pactum Gateway - The payment-processor boundary
//!
//! The engine never talks to a concrete processor SDK; it calls the
//! [`PaymentGateway`] trait and interprets the returned wire types. Processor
//! statuses cross the boundary as strings because that is what processors
//! send; the helper predicates centralize their interpretation.
//!
//! [`SimulatedGateway`] is a deterministic in-process implementation for
//! tests and demos.

pub mod simulated;

pub use simulated::{SimulatedGateway, SimulatedGatewayConfig};

use pactum_types::{EscrowAccountId, Money, PactumError, TransactionId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for gateway calls
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Failures at the payment-processor boundary
///
/// Declines are final for the given request; unavailability is transient
/// and safe to retry with the same idempotent request.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The processor understood the request and refused it
    #[error("payment declined ({code}): {message}")]
    Declined { code: String, message: String },

    /// Transport failure or processor outage
    #[error("payment gateway unavailable: {message}")]
    Unavailable { message: String },

    /// Webhook payload or signature failed verification
    #[error("invalid webhook: {message}")]
    InvalidWebhook { message: String },
}

impl GatewayError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn invalid_webhook(message: impl Into<String>) -> Self {
        Self::InvalidWebhook {
            message: message.into(),
        }
    }

    /// Whether retrying the same request can succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Stable code for the wrapping domain error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Declined { .. } => "GATEWAY_DECLINED",
            Self::Unavailable { .. } => "GATEWAY_UNAVAILABLE",
            Self::InvalidWebhook { .. } => "GATEWAY_INVALID_WEBHOOK",
        }
    }
}

impl From<GatewayError> for PactumError {
    fn from(err: GatewayError) -> Self {
        let retriable = err.is_retriable();
        Self::Gateway {
            code: err.code().to_string(),
            message: err.to_string(),
            retriable,
        }
    }
}

/// A payment intent opened at the processor for an inbound deposit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub payment_intent_id: String,
    /// Handed to the paying client to complete the charge
    pub client_secret: String,
}

/// Outcome of a single outbound transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutExecution {
    /// Raw processor status string
    pub status: String,
    pub transfer_id: Option<String>,
    pub failure_reason: Option<String>,
}

impl PayoutExecution {
    /// Processor statuses that mean the transfer settled
    pub fn is_settled(&self) -> bool {
        matches!(self.status.as_str(), "paid" | "succeeded" | "completed")
    }

    /// The processor explicitly reported the transfer failed
    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }
}

/// One leg of a split payout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitTransfer {
    pub destination_account_ref: String,
    pub amount: Money,
}

/// Outcome of a multi-leg split payout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPayoutExecution {
    /// Raw processor status string
    pub status: String,
    pub transfer_ids: Vec<String>,
    pub failure_reason: Option<String>,
}

impl SplitPayoutExecution {
    pub fn is_settled(&self) -> bool {
        matches!(self.status.as_str(), "paid" | "succeeded" | "completed")
    }

    pub fn is_failed(&self) -> bool {
        self.status == "failed"
    }
}

/// A verified asynchronous confirmation from the processor
///
/// The webhook transport is out of scope; implementations verify the
/// signature and translate the payload into one of these effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WebhookEvent {
    /// An inbound deposit settled; confirm the matching pending deposit
    DepositSucceeded {
        escrow_account_id: EscrowAccountId,
        payment_reference: String,
    },
    /// An outbound transfer settled; mark the payout executed
    PayoutSettled {
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        transfer_reference: Option<String>,
    },
    /// Verified but not a type this engine consumes
    Unrecognized { event_type: String },
}

/// The abstract payment-processor contract
///
/// Implementations carry their own timeout and retry policy; the engine
/// sees either a result or a [`GatewayError`].
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payment intent for money entering escrow
    async fn create_escrow_deposit_intent(
        &self,
        escrow_account_id: EscrowAccountId,
        amount: Money,
        description: Option<&str>,
    ) -> GatewayResult<PaymentIntent>;

    /// Transfer escrowed funds to a single destination account
    async fn execute_escrow_payout(
        &self,
        escrow_account_id: EscrowAccountId,
        transaction_id: TransactionId,
        amount: Money,
        destination_account_ref: &str,
    ) -> GatewayResult<PayoutExecution>;

    /// Transfer escrowed funds to several destinations in one operation
    async fn execute_split_payout(
        &self,
        source_account_ref: Option<&str>,
        transfers: &[SplitTransfer],
    ) -> GatewayResult<SplitPayoutExecution>;

    /// Exchange an authorization code for an external account reference
    async fn connect_account(
        &self,
        owner_user_id: UserId,
        authorization_code: &str,
    ) -> GatewayResult<String>;

    /// Verify and translate an asynchronous processor notification
    async fn handle_webhook(&self, payload: &str, signature: &str) -> GatewayResult<WebhookEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_wrap_with_retriability() {
        let unavailable: PactumError = GatewayError::unavailable("connection reset").into();
        assert!(unavailable.is_retriable());
        assert_eq!(unavailable.error_code(), "GATEWAY_ERROR");

        let declined: PactumError = GatewayError::Declined {
            code: "insufficient_funds".into(),
            message: "balance too low".into(),
        }
        .into();
        assert!(!declined.is_retriable());
    }

    #[test]
    fn settled_statuses_are_recognized() {
        for status in ["paid", "succeeded", "completed"] {
            let exec = PayoutExecution {
                status: status.into(),
                transfer_id: Some("tr_1".into()),
                failure_reason: None,
            };
            assert!(exec.is_settled());
            assert!(!exec.is_failed());
        }

        let failed = PayoutExecution {
            status: "failed".into(),
            transfer_id: None,
            failure_reason: Some("account closed".into()),
        };
        assert!(!failed.is_settled());
        assert!(failed.is_failed());
    }
}
