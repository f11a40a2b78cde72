//! Relay error taxonomy.
//!
//! [`RelayError`] is what the orchestration steps return. When an attempt
//! reaches a terminal failure state the error is flattened into an
//! [`AttemptError`] record so it can be stored, persisted and reported by a
//! later status query.

use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::blockchain::types::ChainError;

/// The two on-chain phases of a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Permit,
    Transfer,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Permit => "permit",
            Phase::Transfer => "transfer",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Permit => write!(f, "Permit"),
            Phase::Transfer => write!(f, "Transfer"),
        }
    }
}

/// Problems with the request itself. Never reach the chain-mutating path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Invalid signature v value: {0}")]
    InvalidV(u64),

    #[error("Invalid signature: {0}")]
    InvalidSignature(&'static str),

    #[error("Permit deadline {deadline} has passed (now {now})")]
    DeadlineExpired { deadline: U256, now: u64 },

    #[error("Signature was produced by {recovered}, not by sender {expected}")]
    SignerMismatch { recovered: Address, expected: Address },
}

/// Everything that can stop a relay.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Insufficient balance. User has {balance}, but {required} is required")]
    InsufficientBalance { balance: U256, required: U256 },

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("{phase} transaction {tx_hash} reverted")]
    Reverted { phase: Phase, tx_hash: TxHash },

    #[error("Relay was interrupted by a restart")]
    Interrupted,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Validation(_) => ErrorKind::Validation,
            RelayError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            RelayError::Chain(_) => ErrorKind::Chain,
            RelayError::Reverted { .. } => ErrorKind::Reverted,
            RelayError::Interrupted => ErrorKind::Interrupted,
            RelayError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Flatten into a storable record, tagging the phase it happened in.
    pub fn to_record(&self, phase: Option<Phase>) -> AttemptError {
        let phase = match self {
            RelayError::Reverted { phase, .. } => Some(*phase),
            _ => phase,
        };
        AttemptError {
            kind: self.kind(),
            phase,
            message: self.to_string(),
        }
    }
}

/// Coarse error class, stable across the wire and the snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    InsufficientBalance,
    Chain,
    Reverted,
    Interrupted,
    Internal,
}

impl ErrorKind {
    /// Whether the caller, not the relayer or the chain, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ErrorKind::Validation | ErrorKind::InsufficientBalance)
    }
}

/// Error recorded on a terminal attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptError {
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    pub message: String,
}
