//! Pactum Policy - Cross-aggregate domain services
//!
//! These services read aggregate state and never mutate it. They run before
//! aggregate operations for precise early errors; the aggregates keep their
//! own authoritative re-checks, so correctness never depends on callers
//! remembering to consult a service.

pub mod payout;
pub mod rules;

pub use payout::*;
pub use rules::*;
