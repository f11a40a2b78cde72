//! Resilience primitives.
//!
//! # Data Flow
//! ```text
//! Receipt polling (blockchain::client):
//!     → backoff.rs (delay between polls, bounded poll count)
//!
//! Pre-mempool rejection (relay::orchestrator):
//!     → backoff.rs (delay before resubmitting with a fresh nonce)
//! ```
//!
//! # Design Decisions
//! - Every retry loop has an explicit attempt count; nothing retries forever
//! - Jittered backoff keeps concurrent attempts from polling in lockstep

pub mod backoff;

pub use backoff::{calculate_backoff, BackoffPolicy};
