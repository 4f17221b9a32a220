//! Pactum Agreement - The commission agreement aggregate
//!
//! A commission agreement is the contract under which escrowed funds are
//! eventually split: an owner, a set of parties with percentage splits, and
//! optional milestones that stage the work.
//!
//! # Invariants
//!
//! 1. Party splits never sum past 100%; activation requires exactly 100%
//! 2. Milestone values never sum past the agreement total
//! 3. Activation requires at least one party and unanimous acceptance
//! 4. The escrow account binding is one-time
//! 5. Every state transition records a domain event; guards run before any
//!    field is touched, so failed operations leave the aggregate unchanged

pub mod agreement;
pub mod milestone;
pub mod party;
pub mod status;

pub use agreement::*;
pub use milestone::*;
pub use party::*;
pub use status::*;
