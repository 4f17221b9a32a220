//! Error types for Pactum
//!
//! Every failure is explicit and carries a stable machine-readable code so
//! API layers can translate without string matching.

use thiserror::Error;

/// Result type for Pactum operations
pub type Result<T> = std::result::Result<T, PactumError>;

/// Pactum error types
#[derive(Debug, Clone, Error)]
pub enum PactumError {
    // ========================================================================
    // Value Errors
    // ========================================================================

    /// Amount overflow during arithmetic
    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    /// Subtraction would produce a negative amount
    #[error("Amount underflow: subtraction would produce a negative amount")]
    AmountUnderflow,

    /// Negative amount where a non-negative one is required
    #[error("Negative amount not allowed: {amount}")]
    NegativeAmount { amount: String },

    /// Amount rejected by a business rule
    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    /// Currency code failed validation
    #[error("Invalid currency code: {code:?}")]
    InvalidCurrency { code: String },

    /// Currency mismatch
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    /// Percentage outside [0, 100]
    #[error("Percentage out of range [0, 100]: {value}")]
    PercentageOutOfRange { value: String },

    /// Idempotency key shorter than the minimum
    #[error("Idempotency key must be at least {min} characters")]
    IdempotencyKeyTooShort { min: usize },

    /// Identifier failed validation (nil UUID, wrong shape)
    #[error("Invalid identifier: {field}")]
    InvalidIdentifier { field: String },

    /// Required text field is blank
    #[error("Field may not be blank: {field}")]
    BlankField { field: String },

    // ========================================================================
    // Agreement Errors
    // ========================================================================

    /// Agreement not found
    #[error("Agreement {agreement_id} not found")]
    AgreementNotFound { agreement_id: String },

    /// Operation requires a Draft agreement
    #[error("Agreement {agreement_id} is not in Draft (status: {status})")]
    AgreementNotDraft { agreement_id: String, status: String },

    /// Operation requires an Active agreement
    #[error("Agreement {agreement_id} is not Active (status: {status})")]
    AgreementNotActive { agreement_id: String, status: String },

    /// Agreement already reached a terminal status
    #[error("Agreement {agreement_id} is already finalized (status: {status})")]
    AgreementFinalized { agreement_id: String, status: String },

    /// Party with the same id already on the agreement
    #[error("Party {party_id} is already on the agreement")]
    DuplicateParty { party_id: String },

    /// Party not found on the agreement
    #[error("Party {party_id} not found on the agreement")]
    PartyNotFound { party_id: String },

    /// Split sum would exceed 100
    #[error("Party splits may not exceed 100%: adding would reach {total}%")]
    SplitLimitExceeded { total: String },

    /// Split sum must close at exactly 100 for activation
    #[error("Party splits must total exactly 100% to activate (currently {total}%)")]
    SplitNotClosed { total: String },

    /// Activation requires at least one party
    #[error("Agreement {agreement_id} has no parties")]
    NoParties { agreement_id: String },

    /// Every party must accept before activation
    #[error("Party {party_id} has not accepted the agreement")]
    PartyNotAccepted { party_id: String },

    /// Escrow binding is one-time
    #[error("Agreement {agreement_id} already has an escrow account attached")]
    EscrowAlreadyAttached { agreement_id: String },

    /// Milestone with the same id already on the agreement
    #[error("Milestone {milestone_id} is already on the agreement")]
    DuplicateMilestone { milestone_id: String },

    /// Milestone not found on the agreement
    #[error("Milestone {milestone_id} not found on the agreement")]
    MilestoneNotFound { milestone_id: String },

    /// Milestone belongs to a different agreement
    #[error("Milestone {milestone_id} does not belong to agreement {agreement_id}")]
    MilestoneNotOnAgreement {
        milestone_id: String,
        agreement_id: String,
    },

    /// Milestone values may not sum past the agreement total
    #[error("Milestone values may not exceed the agreement total: {attempted} > {total}")]
    MilestonesExceedTotal { attempted: String, total: String },

    /// Completion requires every milestone completed
    #[error("Agreement {agreement_id} still has {remaining} unfinished milestone(s)")]
    MilestonesNotCompleted {
        agreement_id: String,
        remaining: usize,
    },

    /// Milestone payouts require a completed milestone
    #[error("Milestone {milestone_id} is not completed")]
    MilestoneNotCompleted { milestone_id: String },

    /// Milestone payout larger than the milestone value
    #[error("Payout of {requested} exceeds milestone {milestone_id} value of {value}")]
    PayoutExceedsMilestone {
        milestone_id: String,
        requested: String,
        value: String,
    },

    /// Party has no linked payout account
    #[error("Party {party_id} has no linked payout account")]
    PayoutAccountMissing { party_id: String },

    // ========================================================================
    // Escrow Errors
    // ========================================================================

    /// Escrow account not found
    #[error("Escrow account {escrow_account_id} not found")]
    EscrowAccountNotFound { escrow_account_id: String },

    /// Operation requires an Active escrow account
    #[error("Escrow account {escrow_account_id} is not Active (status: {status})")]
    AccountNotActive {
        escrow_account_id: String,
        status: String,
    },

    /// Payout or fee would exceed the available balance
    #[error("Insufficient escrow balance in {escrow_account_id}: requested {requested}, available {available}")]
    InsufficientEscrowBalance {
        escrow_account_id: String,
        requested: String,
        available: String,
    },

    /// Transaction not found on the escrow account
    #[error("Transaction {transaction_id} not found on the escrow account")]
    TransactionNotFound { transaction_id: String },

    /// Transaction with the same id already in the ledger
    #[error("Transaction {transaction_id} is already in the ledger")]
    DuplicateTransaction { transaction_id: String },

    /// Transition not allowed by the transaction state machine
    #[error("Transaction {transaction_id} cannot {action} from status {from}")]
    InvalidTransactionState {
        transaction_id: String,
        from: String,
        action: String,
    },

    /// Escrow still has pending or approved payouts outstanding
    #[error("Escrow account {escrow_account_id} is not settled: {outstanding} payout(s) outstanding")]
    EscrowNotSettled {
        escrow_account_id: String,
        outstanding: usize,
    },

    // ========================================================================
    // Authorization Errors
    // ========================================================================

    /// Acting user does not own the target aggregate
    #[error("User {user_id} does not own this resource")]
    NotOwner { user_id: String },

    /// Unauthorized action
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    // ========================================================================
    // Concurrency & External Errors
    // ========================================================================

    /// Stale write rejected by optimistic concurrency control
    #[error("Concurrent modification of {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        aggregate_id: String,
        expected: u64,
        actual: u64,
    },

    /// Payment gateway failure
    #[error("Payment gateway error ({code}): {message}")]
    Gateway {
        code: String,
        message: String,
        retriable: bool,
    },

    // ========================================================================
    // General Errors
    // ========================================================================

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PactumError {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Create a blank-field validation error
    pub fn blank_field(field: impl Into<String>) -> Self {
        Self::BlankField {
            field: field.into(),
        }
    }

    /// Create an invalid-identifier validation error
    pub fn invalid_identifier(field: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            field: field.into(),
        }
    }

    /// Create an invalid-amount validation error
    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::InvalidAmount {
            message: message.into(),
        }
    }

    /// Check if this is a retriable error
    ///
    /// Retriable failures are transient: the same request may succeed on a
    /// later attempt without any state change in between.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::ConcurrencyConflict { .. } | Self::Internal { .. } => true,
            Self::Gateway { retriable, .. } => *retriable,
            _ => false,
        }
    }

    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::AmountUnderflow => "AMOUNT_UNDERFLOW",
            Self::NegativeAmount { .. } => "NEGATIVE_AMOUNT",
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::InvalidCurrency { .. } => "INVALID_CURRENCY",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::PercentageOutOfRange { .. } => "PERCENTAGE_OUT_OF_RANGE",
            Self::IdempotencyKeyTooShort { .. } => "IDEMPOTENCY_KEY_TOO_SHORT",
            Self::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            Self::BlankField { .. } => "BLANK_FIELD",
            Self::AgreementNotFound { .. } => "AGREEMENT_NOT_FOUND",
            Self::AgreementNotDraft { .. } => "AGREEMENT_NOT_DRAFT",
            Self::AgreementNotActive { .. } => "AGREEMENT_NOT_ACTIVE",
            Self::AgreementFinalized { .. } => "AGREEMENT_FINALIZED",
            Self::DuplicateParty { .. } => "DUPLICATE_PARTY",
            Self::PartyNotFound { .. } => "PARTY_NOT_FOUND",
            Self::SplitLimitExceeded { .. } => "SPLIT_LIMIT_EXCEEDED",
            Self::SplitNotClosed { .. } => "SPLIT_NOT_CLOSED",
            Self::NoParties { .. } => "NO_PARTIES",
            Self::PartyNotAccepted { .. } => "PARTY_NOT_ACCEPTED",
            Self::EscrowAlreadyAttached { .. } => "ESCROW_ALREADY_ATTACHED",
            Self::DuplicateMilestone { .. } => "DUPLICATE_MILESTONE",
            Self::MilestoneNotFound { .. } => "MILESTONE_NOT_FOUND",
            Self::MilestoneNotOnAgreement { .. } => "MILESTONE_NOT_ON_AGREEMENT",
            Self::MilestonesExceedTotal { .. } => "MILESTONES_EXCEED_TOTAL",
            Self::MilestonesNotCompleted { .. } => "MILESTONES_NOT_COMPLETED",
            Self::MilestoneNotCompleted { .. } => "MILESTONE_NOT_COMPLETED",
            Self::PayoutExceedsMilestone { .. } => "PAYOUT_EXCEEDS_MILESTONE",
            Self::PayoutAccountMissing { .. } => "PAYOUT_ACCOUNT_MISSING",
            Self::EscrowAccountNotFound { .. } => "ESCROW_ACCOUNT_NOT_FOUND",
            Self::AccountNotActive { .. } => "ACCOUNT_NOT_ACTIVE",
            Self::InsufficientEscrowBalance { .. } => "INSUFFICIENT_ESCROW_BALANCE",
            Self::TransactionNotFound { .. } => "TRANSACTION_NOT_FOUND",
            Self::DuplicateTransaction { .. } => "DUPLICATE_TRANSACTION",
            Self::InvalidTransactionState { .. } => "INVALID_TRANSACTION_STATE",
            Self::EscrowNotSettled { .. } => "ESCROW_NOT_SETTLED",
            Self::NotOwner { .. } => "NOT_OWNER",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            Self::Gateway { .. } => "GATEWAY_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = PactumError::InsufficientEscrowBalance {
            escrow_account_id: "esc_test".to_string(),
            requested: "500".to_string(),
            available: "100".to_string(),
        };
        assert_eq!(err.error_code(), "INSUFFICIENT_ESCROW_BALANCE");
    }

    #[test]
    fn test_retriable_errors() {
        let conflict = PactumError::ConcurrencyConflict {
            aggregate_id: "agr_test".to_string(),
            expected: 1,
            actual: 2,
        };
        assert!(conflict.is_retriable());

        let declined = PactumError::Gateway {
            code: "CARD_DECLINED".to_string(),
            message: "declined".to_string(),
            retriable: false,
        };
        assert!(!declined.is_retriable());

        let unavailable = PactumError::Gateway {
            code: "UNAVAILABLE".to_string(),
            message: "timeout".to_string(),
            retriable: true,
        };
        assert!(unavailable.is_retriable());

        let not_draft = PactumError::AgreementNotDraft {
            agreement_id: "agr_test".to_string(),
            status: "Active".to_string(),
        };
        assert!(!not_draft.is_retriable());
    }
}
