//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the relayer key from the environment
//! - Initialize subsystems in dependency order
//! - Hand back everything `main` needs to serve and to shut down
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::blockchain::client::{ChainClient, ReceiptPolicy, RpcChainClient};
use crate::blockchain::token::{load_token_abi, AbiFileError};
use crate::blockchain::transaction::GasPolicy;
use crate::blockchain::types::ChainError;
use crate::blockchain::wallet::RelayerAccount;
use crate::config::{RelayConfig, RelayerConfig};
use crate::relay::orchestrator::{OrchestratorPolicy, TransactionOrchestrator};
use crate::relay::service::RelayService;
use crate::relay::store::AttemptStore;
use crate::relay::validator::SignatureValidator;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("relayer account: {0}")]
    Account(ChainError),
    #[error("chain client: {0}")]
    Chain(ChainError),
    #[error("token ABI: {0}")]
    Abi(#[from] AbiFileError),
    #[error("attempt snapshot: {0}")]
    Snapshot(#[from] std::io::Error),
}

/// A fully wired relayer.
#[derive(Debug, Clone)]
pub struct Relayer {
    pub service: RelayService,
    pub attempts: AttemptStore,
}

impl From<&RelayConfig> for ReceiptPolicy {
    fn from(config: &RelayConfig) -> Self {
        Self {
            max_polls: config.receipt_max_polls,
            base_delay_ms: config.receipt_poll_base_ms,
            max_delay_ms: config.receipt_poll_max_ms,
        }
    }
}

/// Build every subsystem from a validated config.
pub async fn bootstrap(config: &RelayerConfig) -> Result<Relayer, StartupError> {
    let account = RelayerAccount::from_env(
        &config.blockchain.private_key_env,
        config.blockchain.chain_id,
    )
    .map_err(StartupError::Account)?;
    tracing::info!(relayer = %account.address(), "Relayer account loaded");

    let client = RpcChainClient::new(
        config.blockchain.clone(),
        account.address(),
        ReceiptPolicy::from(&config.relay),
    )
    .await
    .map_err(StartupError::Chain)?;

    assemble(config, Arc::new(client), account)
}

/// Wire the relay core around an existing chain client.
///
/// Split from [`bootstrap`] so a different [`ChainClient`] can be injected.
pub fn assemble(
    config: &RelayerConfig,
    chain: Arc<dyn ChainClient>,
    account: RelayerAccount,
) -> Result<Relayer, StartupError> {
    if let Some(path) = &config.token.abi_path {
        let abi = load_token_abi(Path::new(path))?;
        tracing::info!(
            path = %path,
            functions = abi.functions.len(),
            "Token ABI checked"
        );
    }

    let attempts = match &config.relay.attempts_path {
        Some(path) => AttemptStore::load_from_file(path)?,
        None => AttemptStore::new(None),
    };

    let validator = SignatureValidator::new(account.address(), config.relay.verify_signatures);
    let orchestrator = TransactionOrchestrator::new(
        chain,
        account,
        validator,
        attempts.clone(),
        GasPolicy::from(&config.blockchain),
        OrchestratorPolicy::from(&config.relay),
    );

    Ok(Relayer {
        service: RelayService::new(Arc::new(orchestrator)),
        attempts,
    })
}
