//! Two-phase relay driver.
//!
//! # Ordering
//! validate → balance check → permit (submit, confirm) → transferFrom
//! (submit, confirm). Every transition is published to the [`AttemptStore`]
//! before the next step starts, so status queries observe partial progress.
//!
//! # Nonce discipline
//! The relayer nonce is read, used to build and sign, and submitted while
//! `submit_lock` is held. Receipt waits happen outside the lock.

use alloy::primitives::{Address, Bytes, TxHash};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::blockchain::client::ChainClient;
use crate::blockchain::token::{encode_permit, encode_transfer_from};
use crate::blockchain::transaction::GasPolicy;
use crate::blockchain::types::ChainError;
use crate::blockchain::wallet::RelayerAccount;
use crate::config::RelayConfig;
use crate::observability::metrics;
use crate::relay::attempt::{RelayAttempt, RelayState};
use crate::relay::error::{Phase, RelayError, ValidationError};
use crate::relay::request::RelayRequest;
use crate::relay::store::{Admission, AttemptStore};
use crate::relay::validator::{SignatureValidator, Verification};
use crate::resilience::backoff::BackoffPolicy;

/// Timing and confirmation policy.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorPolicy {
    /// Upper bound on each receipt wait.
    pub receipt_timeout: Duration,
    /// Resubmission budget after pre-mempool rejections.
    pub resubmit: BackoffPolicy,
    /// Block `relay` until the transfer is mined. When false the transfer is
    /// confirmed in the background and observable through the store.
    pub await_transfer_receipt: bool,
}

impl From<&RelayConfig> for OrchestratorPolicy {
    fn from(config: &RelayConfig) -> Self {
        Self {
            receipt_timeout: Duration::from_secs(config.receipt_timeout_secs),
            resubmit: BackoffPolicy {
                max_attempts: config.max_submit_attempts,
                ..BackoffPolicy::default()
            },
            await_transfer_receipt: config.await_transfer_receipt,
        }
    }
}

pub struct TransactionOrchestrator {
    chain: Arc<dyn ChainClient>,
    account: RelayerAccount,
    validator: SignatureValidator,
    attempts: AttemptStore,
    submit_lock: Mutex<()>,
    gas: GasPolicy,
    policy: OrchestratorPolicy,
}

impl TransactionOrchestrator {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        account: RelayerAccount,
        validator: SignatureValidator,
        attempts: AttemptStore,
        gas: GasPolicy,
        policy: OrchestratorPolicy,
    ) -> Self {
        Self {
            chain,
            account,
            validator,
            attempts,
            submit_lock: Mutex::new(()),
            gas,
            policy,
        }
    }

    pub fn attempts(&self) -> &AttemptStore {
        &self.attempts
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    pub fn relayer_address(&self) -> Address {
        self.account.address()
    }

    /// Relay `request`, or return the existing attempt with the same id.
    ///
    /// Once this future is polled past admission it should be allowed to
    /// finish; callers that may be cancelled should spawn it.
    pub async fn relay(self: &Arc<Self>, request: RelayRequest) -> RelayAttempt {
        let attempt = match self.attempts.admit(request) {
            Admission::Existing(existing) => {
                tracing::info!(
                    attempt_id = %existing.id,
                    state = %existing.state,
                    "Duplicate relay request, returning existing attempt"
                );
                return existing;
            }
            Admission::New(attempt) => attempt,
        };

        let span = tracing::info_span!(
            "relay",
            attempt_id = %attempt.id,
            token = %attempt.request.token,
            sender = %attempt.request.sender,
        );
        self.drive(attempt).instrument(span).await
    }

    /// Dry-run signature check against the token's domain separator.
    pub async fn verify(&self, request: &RelayRequest) -> Result<Verification, ChainError> {
        self.validator.verify(request, self.chain.as_ref()).await
    }

    async fn drive(self: &Arc<Self>, mut attempt: RelayAttempt) -> RelayAttempt {
        let request = attempt.request.clone();

        if let Err(e) = self.validator.validate(&request, self.chain.as_ref()).await {
            return self.fail(attempt, RelayState::ValidationFailed, e, None);
        }
        self.step(&mut attempt, RelayState::Validated);

        let balance = match self.chain.get_balance(request.token, request.sender).await {
            Ok(balance) => balance,
            Err(e) => return self.fail(attempt, RelayState::PermitFailed, e.into(), Some(Phase::Permit)),
        };
        if balance < request.amount {
            let err = RelayError::InsufficientBalance {
                balance,
                required: request.amount,
            };
            return self.fail(attempt, RelayState::InsufficientBalance, err, None);
        }

        let Some(v) = request.signature.permit_v() else {
            let err = RelayError::from(ValidationError::InvalidV(request.signature.v));
            return self.fail(attempt, RelayState::PermitFailed, err, Some(Phase::Permit));
        };
        let permit_input = encode_permit(
            request.sender,
            self.account.address(),
            request.amount,
            request.deadline,
            v,
            request.signature.r,
            request.signature.s,
        );
        let permit_hash = match self.submit_call(Phase::Permit, request.token, permit_input).await {
            Ok(hash) => hash,
            Err(e) => return self.fail(attempt, RelayState::PermitFailed, e, Some(Phase::Permit)),
        };
        attempt.permit_tx_hash = Some(permit_hash);
        self.step(&mut attempt, RelayState::PermitSubmitted);

        if let Err(e) = self.confirm(Phase::Permit, permit_hash).await {
            return self.fail(attempt, RelayState::PermitFailed, e, Some(Phase::Permit));
        }
        self.step(&mut attempt, RelayState::PermitConfirmed);

        let transfer_input = encode_transfer_from(request.sender, request.recipient, request.amount);
        let transfer_hash = match self.submit_call(Phase::Transfer, request.token, transfer_input).await {
            Ok(hash) => hash,
            Err(e) => return self.fail(attempt, RelayState::TransferFailed, e, Some(Phase::Transfer)),
        };
        attempt.transfer_tx_hash = Some(transfer_hash);
        self.step(&mut attempt, RelayState::TransferSubmitted);

        if self.policy.await_transfer_receipt {
            return self.finish_transfer(attempt, transfer_hash).await;
        }

        let snapshot = attempt.clone();
        let this = Arc::clone(self);
        tokio::spawn(
            async move {
                this.finish_transfer(attempt, transfer_hash).await;
            }
            .in_current_span(),
        );
        snapshot
    }

    async fn finish_transfer(&self, mut attempt: RelayAttempt, tx_hash: TxHash) -> RelayAttempt {
        if let Err(e) = self.confirm(Phase::Transfer, tx_hash).await {
            return self.fail(attempt, RelayState::TransferFailed, e, Some(Phase::Transfer));
        }
        self.step(&mut attempt, RelayState::TransferConfirmed);
        metrics::record_attempt_outcome("TransferConfirmed");
        tracing::info!(
            permit_tx_hash = ?attempt.permit_tx_hash,
            transfer_tx_hash = %tx_hash,
            "Relay completed"
        );
        attempt
    }

    /// Build, sign and submit one call under the nonce lock.
    ///
    /// Only node-side rejections are retried, each time with a fresh nonce and
    /// gas price, up to the resubmission budget.
    async fn submit_call(&self, phase: Phase, to: Address, input: Bytes) -> Result<TxHash, RelayError> {
        let mut attempt_no: u32 = 1;
        loop {
            let result = {
                let _guard = self.submit_lock.lock().await;
                let call = self.gas.prepare(self.chain.as_ref(), to, input.clone()).await?;
                let raw = self.account.sign(&call).await?;
                self.chain.submit(raw).await.map(|hash| (hash, call.nonce))
            };

            match result {
                Ok((tx_hash, nonce)) => {
                    metrics::record_submission(phase.as_str());
                    tracing::info!(phase = phase.as_str(), %tx_hash, nonce, "Transaction submitted");
                    return Ok(tx_hash);
                }
                Err(e) if e.is_pre_mempool_rejection() => {
                    metrics::record_submit_rejection(phase.as_str());
                    attempt_no += 1;
                    let Some(delay) = self.policy.resubmit.delay_before(attempt_no) else {
                        tracing::warn!(phase = phase.as_str(), error = %e, "Submission rejected, giving up");
                        return Err(e.into());
                    };
                    tracing::warn!(
                        phase = phase.as_str(),
                        error = %e,
                        attempt = attempt_no,
                        "Submission rejected, resubmitting with fresh nonce"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn confirm(&self, phase: Phase, tx_hash: TxHash) -> Result<(), RelayError> {
        let receipt = self.chain.await_receipt(tx_hash, self.policy.receipt_timeout).await?;
        if receipt.succeeded() {
            tracing::info!(phase = phase.as_str(), %tx_hash, block = receipt.block_number, "Transaction confirmed");
            Ok(())
        } else {
            Err(RelayError::Reverted { phase, tx_hash })
        }
    }

    fn step(&self, attempt: &mut RelayAttempt, next: RelayState) {
        if let Err(e) = attempt.advance(next) {
            tracing::error!(error = %e, "Attempt state machine violated");
        }
        self.attempts.publish(attempt);
        tracing::debug!(state = %attempt.state, "Attempt advanced");
    }

    fn fail(
        &self,
        mut attempt: RelayAttempt,
        next: RelayState,
        error: RelayError,
        phase: Option<Phase>,
    ) -> RelayAttempt {
        let record = error.to_record(phase);
        if let Err(e) = attempt.fail(next, record) {
            tracing::error!(error = %e, "Attempt state machine violated");
        }
        self.attempts.publish(&attempt);
        metrics::record_attempt_outcome(&attempt.state.to_string());
        if error.kind().is_client_error() {
            tracing::info!(state = %attempt.state, error = %error, "Relay rejected");
        } else {
            tracing::warn!(state = %attempt.state, error = %error, "Relay failed");
        }
        attempt
    }
}

impl std::fmt::Debug for TransactionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionOrchestrator")
            .field("relayer", &self.account.address())
            .field("gas", &self.gas)
            .field("policy", &self.policy)
            .finish()
    }
}
