//! Relay core.
//!
//! # Data Flow
//! ```text
//! JSON body
//!     → request.rs (RelayRequestBody::parse → RelayRequest, AttemptId)
//!     → service.rs (RelayService: spawn, status, health)
//!     → orchestrator.rs (TransactionOrchestrator)
//!         → validator.rs (shape, deadline, EIP-712 signer recovery)
//!         → store.rs (idempotent admission, published snapshots)
//!         → blockchain (balance, nonce, sign, submit, receipts)
//!     → attempt.rs (RelayAttempt state machine)
//! ```
//!
//! # Invariants
//! - Nothing reaches the chain-mutating path without passing validation
//! - One transaction under construction per relayer account at a time
//! - Every failure is recorded on the attempt, not only returned

pub mod attempt;
pub mod error;
pub mod orchestrator;
pub mod request;
pub mod service;
pub mod store;
pub mod validator;

pub use attempt::{AttemptSummary, RelayAttempt, RelayState};
pub use error::{AttemptError, ErrorKind, Phase, RelayError, ValidationError};
pub use orchestrator::{OrchestratorPolicy, TransactionOrchestrator};
pub use request::{AttemptId, RelayRequest, RelayRequestBody};
pub use service::{HealthReport, RelayService};
pub use store::{Admission, AttemptStore};
pub use validator::{SignatureValidator, Verification};
