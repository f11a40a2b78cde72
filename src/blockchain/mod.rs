//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment variable (private key) + config (RPC URLs, gas policy)
//!     → wallet.rs (RelayerAccount: key loading, signing)
//!     → client.rs (ChainClient: reads, submission, receipts, with timeouts)
//!     → transaction.rs (fresh nonce + gas price → UnsignedCall)
//!     → token.rs (EIP-2612 bindings, calldata, typed-data digest)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when blockchain unreachable

pub mod client;
pub mod token;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{ChainClient, ReceiptPolicy, RpcChainClient};
pub use transaction::GasPolicy;
pub use types::{ChainError, ChainId, ChainResult, Receipt, ReceiptStatus, UnsignedCall};
pub use wallet::RelayerAccount;
