//! Pactum Escrow - The money-holding ledger aggregate
//!
//! An escrow account is tied 1:1 to a commission agreement and holds its
//! funds as an append-mostly transaction ledger. Deposits, payouts, refunds
//! and fees are all [`EscrowTransaction`] entries; the balance is derived
//! from the ledger on every read.
//!
//! # Invariants
//!
//! 1. Balance is a pure fold over the ledger, never a stored counter
//! 2. A payout is never registered or executed past the available balance
//! 3. Pending payouts reserve availability until approved or rejected
//! 4. Every money-moving entry carries an idempotency key; replays return
//!    the original entry instead of creating a second monetary effect
//! 5. Transaction statuses move only along the allowed graph

pub mod account;
pub mod status;
pub mod transaction;

pub use account::*;
pub use status::*;
pub use transaction::*;
