//! Externally callable relay API.
//!
//! Delegation and response shaping only.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::blockchain::types::ChainError;
use crate::observability::metrics;
use crate::relay::attempt::{AttemptSummary, RelayAttempt};
use crate::relay::error::RelayError;
use crate::relay::orchestrator::TransactionOrchestrator;
use crate::relay::request::{AttemptId, RelayRequest};
use crate::relay::store::AttemptStore;
use crate::relay::validator::Verification;

/// Result of a health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub chain_reachable: bool,
    pub relayer_address: Address,
    pub current_block: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RelayService {
    orchestrator: Arc<TransactionOrchestrator>,
}

impl RelayService {
    pub fn new(orchestrator: Arc<TransactionOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Relay `request` to a terminal state, or to `TransferSubmitted` when
    /// transfer confirmation runs in the background.
    ///
    /// The relay runs on its own task: dropping this future does not stop it.
    pub async fn submit(&self, request: RelayRequest) -> Result<RelayAttempt, RelayError> {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move { orchestrator.relay(request).await })
            .await
            .map_err(|e| RelayError::Internal(format!("relay task failed: {e}")))
    }

    pub fn status(&self, id: &AttemptId) -> Option<AttemptSummary> {
        self.orchestrator.attempts().get(id).map(|a| a.summary())
    }

    pub async fn verify(&self, request: &RelayRequest) -> Result<Verification, ChainError> {
        self.orchestrator.verify(request).await
    }

    pub async fn health(&self) -> HealthReport {
        let relayer_address = self.orchestrator.relayer_address();
        let report = match self.orchestrator.chain().get_block_number().await {
            Ok(block) => HealthReport {
                chain_reachable: true,
                relayer_address,
                current_block: Some(block),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Health probe could not reach the chain");
                HealthReport {
                    chain_reachable: false,
                    relayer_address,
                    current_block: None,
                }
            }
        };
        metrics::record_chain_health(report.chain_reachable);
        report
    }

    pub fn attempts(&self) -> &AttemptStore {
        self.orchestrator.attempts()
    }
}
