//! Pactum Engine - Application commands over the escrow and agreement domain
//!
//! The engine wires aggregates, policies, repositories, the payment gateway
//! and the event channel into commands. Every command follows the same
//! shape:
//!
//! 1. Validate input and authorization
//! 2. Load the aggregate(s)
//! 3. Run advisory policy pre-checks
//! 4. Mutate one aggregate (it re-checks its own invariants)
//! 5. Persist through the version-checked repository
//! 6. Dispatch the recorded events, leaving the queue empty
//!
//! Gateway calls that move real money happen before the ledger write for
//! inbound intents (a gateway failure leaves the ledger unwritten) and
//! between load and persist for outbound transfers (an explicit failure
//! status is recorded, a transport error leaves the payout Approved for
//! retry).

pub mod agreement_service;
pub mod clock;
pub mod dispatch;
pub mod escrow_service;
pub mod memory;
pub mod repository;

pub use agreement_service::AgreementService;
pub use clock::{Clock, FixedClock, SystemClock};
pub use dispatch::{EventDispatcher, LoggingDispatcher, RecordingDispatcher};
pub use escrow_service::{DepositInitiation, EscrowService, WebhookOutcome};
pub use memory::{InMemoryAgreementRepository, InMemoryEscrowAccountRepository};
pub use repository::{AgreementRepository, EscrowAccountRepository};
