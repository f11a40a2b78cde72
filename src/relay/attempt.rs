//! Relay attempt lifecycle.
//!
//! ```text
//! Received ─► Validated ─► PermitSubmitted ─► PermitConfirmed ─► TransferSubmitted ─► TransferConfirmed
//!    │            │   │            │                  │                   │
//!    ▼            ▼   ▼            ▼                  ▼                   ▼
//! ValidationFailed  InsufficientBalance / PermitFailed        TransferFailed
//! ```
//!
//! Transitions only move forward. Resubmission after a pre-mempool rejection
//! happens inside `PermitSubmitted`/`TransferSubmitted` and is not a state
//! change.

use alloy::primitives::TxHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::relay::error::{AttemptError, Phase};
use crate::relay::request::{AttemptId, RelayRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayState {
    Received,
    Validated,
    PermitSubmitted,
    PermitConfirmed,
    TransferSubmitted,
    TransferConfirmed,
    ValidationFailed,
    InsufficientBalance,
    PermitFailed,
    TransferFailed,
}

impl RelayState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RelayState::TransferConfirmed
                | RelayState::ValidationFailed
                | RelayState::InsufficientBalance
                | RelayState::PermitFailed
                | RelayState::TransferFailed
        )
    }

    pub fn is_success(&self) -> bool {
        *self == RelayState::TransferConfirmed
    }

    pub fn is_failure(&self) -> bool {
        self.is_terminal() && !self.is_success()
    }

    pub fn can_transition_to(&self, next: RelayState) -> bool {
        use RelayState::*;
        matches!(
            (self, next),
            (Received, Validated)
                | (Received, ValidationFailed)
                | (Validated, PermitSubmitted)
                | (Validated, InsufficientBalance)
                | (Validated, PermitFailed)
                | (PermitSubmitted, PermitConfirmed)
                | (PermitSubmitted, PermitFailed)
                | (PermitConfirmed, TransferSubmitted)
                | (PermitConfirmed, TransferFailed)
                | (TransferSubmitted, TransferConfirmed)
                | (TransferSubmitted, TransferFailed)
        )
    }

    /// Failure state for a relay cut short while in this state.
    pub fn interrupted(&self) -> Option<RelayState> {
        match self {
            RelayState::Received => Some(RelayState::ValidationFailed),
            RelayState::Validated | RelayState::PermitSubmitted => Some(RelayState::PermitFailed),
            RelayState::PermitConfirmed | RelayState::TransferSubmitted => {
                Some(RelayState::TransferFailed)
            }
            _ => None,
        }
    }

    /// The on-chain phase this state belongs to, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            RelayState::PermitSubmitted | RelayState::PermitFailed => Some(Phase::Permit),
            RelayState::PermitConfirmed
            | RelayState::TransferSubmitted
            | RelayState::TransferConfirmed
            | RelayState::TransferFailed => Some(Phase::Transfer),
            _ => None,
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub from: RelayState,
    pub to: RelayState,
}

/// One request's progress through the two-phase relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayAttempt {
    pub id: AttemptId,
    pub request: RelayRequest,
    pub state: RelayState,
    pub permit_tx_hash: Option<TxHash>,
    pub transfer_tx_hash: Option<TxHash>,
    pub error: Option<AttemptError>,
    /// Hashes sent by failed earlier attempts under the same id. They may
    /// still be mined.
    #[serde(default)]
    pub previous_tx_hashes: Vec<TxHash>,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    pub updated_at: u64,
}

impl RelayAttempt {
    pub fn new(request: RelayRequest) -> Self {
        let now = now_millis();
        Self {
            id: request.attempt_id(),
            request,
            state: RelayState::Received,
            permit_tx_hash: None,
            transfer_tx_hash: None,
            error: None,
            previous_tx_hashes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// A fresh attempt replacing the failed `prior`, remembering what it sent.
    pub fn superseding(request: RelayRequest, prior: &RelayAttempt) -> Self {
        let mut attempt = Self::new(request);
        attempt.previous_tx_hashes = prior.sent_tx_hashes();
        attempt
    }

    /// Every hash this attempt and its predecessors put on the wire.
    pub fn sent_tx_hashes(&self) -> Vec<TxHash> {
        let mut hashes = self.previous_tx_hashes.clone();
        hashes.extend(self.permit_tx_hash);
        hashes.extend(self.transfer_tx_hash);
        hashes
    }

    /// Move to `next`, refusing anything the lifecycle does not allow.
    pub fn advance(&mut self, next: RelayState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.updated_at = now_millis().max(self.updated_at);
        Ok(())
    }

    /// Move to a failure state and attach the error.
    pub fn fail(&mut self, next: RelayState, error: AttemptError) -> Result<(), TransitionError> {
        self.advance(next)?;
        self.error = Some(error);
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn summary(&self) -> AttemptSummary {
        AttemptSummary {
            attempt_id: self.id,
            state: self.state,
            permit_tx_hash: self.permit_tx_hash,
            transfer_tx_hash: self.transfer_tx_hash,
            error: self.error.clone(),
            previous_tx_hashes: self.previous_tx_hashes.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only view returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSummary {
    pub attempt_id: AttemptId,
    pub state: RelayState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permit_tx_hash: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_tx_hash: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AttemptError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_tx_hashes: Vec<TxHash>,
    pub created_at: u64,
    pub updated_at: u64,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
