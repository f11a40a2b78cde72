//! Chain-specific types and error definitions.

use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::config::schema::BlockchainConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors that can occur during blockchain operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The node answered but refused the transaction before it reached the mempool.
    #[error("Transaction rejected by node: {0}")]
    Rejected(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// No receipt was observed within the polling budget.
    #[error("No receipt for {tx_hash} after {polls} polls")]
    ReceiptTimeout { tx_hash: TxHash, polls: u32 },

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Contract return data could not be decoded.
    #[error("ABI error: {0}")]
    Abi(String),

    /// Building or signing a transaction failed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

impl ChainError {
    /// Whether a submission that failed this way may be retried with a fresh nonce.
    ///
    /// Only node-side rejections qualify: the transaction provably never
    /// entered the mempool. Transport failures are ambiguous.
    pub fn is_pre_mempool_rejection(&self) -> bool {
        matches!(self, ChainError::Rejected(_))
    }
}

/// Result type for blockchain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Outcome recorded in a mined transaction's receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// The part of a receipt the relayer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub status: ReceiptStatus,
    pub block_number: u64,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// An unsigned contract call the relayer pays for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedCall {
    /// Contract being called.
    pub to: Address,
    /// ABI-encoded call data.
    pub input: alloy::primitives::Bytes,
    /// Relayer account nonce.
    pub nonce: u64,
    /// Gas price in wei.
    pub gas_price: u128,
    /// Gas limit.
    pub gas_limit: u64,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Native value attached; always zero for token relays.
    pub value: U256,
}
