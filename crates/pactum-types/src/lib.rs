//! Pactum Types - Canonical domain types for escrow settlement
//!
//! This crate contains all foundational types for Pactum with zero dependencies
//! on other pactum crates. It defines:
//!
//! - Identity types (AgreementId, EscrowAccountId, TransactionId, etc.)
//! - Currency, money and percentage types on exact decimal arithmetic
//! - Idempotency keys for money-moving requests
//! - Approval tiers for payout classification
//! - Domain events emitted by the aggregates
//! - The error taxonomy with stable machine-readable codes
//!
//! # Financial Invariants
//!
//! These types support the core Pactum correctness guarantees:
//!
//! 1. Money is non-negative and currency-tagged; arithmetic is explicit and fallible
//! 2. Split percentages live in [0, 100] and may never sum past 100
//! 3. Every money-moving request carries an idempotency key
//! 4. Failure is explicit - no panicking operators in domain code

pub mod identity;
pub mod currency;
pub mod money;
pub mod percentage;
pub mod idempotency;
pub mod approval;
pub mod event;
pub mod error;

pub use identity::*;
pub use currency::*;
pub use money::*;
pub use percentage::*;
pub use idempotency::*;
pub use approval::*;
pub use event::*;
pub use error::*;

/// Version of the Pactum types schema
pub const TYPES_VERSION: &str = "0.1.0";
