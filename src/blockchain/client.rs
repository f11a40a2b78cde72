//! Ledger RPC access.
//!
//! # Responsibilities
//! - Define the [`ChainClient`] seam the relay core talks to
//! - Implement it over JSON-RPC with failover providers and per-call timeouts
//! - Poll for receipts with a bounded, backed-off budget
//!
//! No operation here retries across operations; each call either answers
//! from one of the providers or fails with a [`ChainError`].

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, TransactionReceipt, TransactionRequest};
use alloy::sol_types::SolCall;
use alloy::transports::RpcError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::blockchain::token::IERC20Permit;
use crate::blockchain::types::{
    BlockchainConfig, ChainError, ChainId, ChainResult, Receipt, ReceiptStatus,
};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Receipt polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptPolicy {
    /// Maximum number of `eth_getTransactionReceipt` polls.
    pub max_polls: u32,
    /// Base delay for exponential backoff between polls.
    pub base_delay_ms: u64,
    /// Cap on the delay between polls.
    pub max_delay_ms: u64,
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self {
            max_polls: 60,
            base_delay_ms: 500,
            max_delay_ms: 4_000,
        }
    }
}

/// Everything the relay core needs from the ledger.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Token balance of `owner`.
    async fn get_balance(&self, token: Address, owner: Address) -> ChainResult<U256>;

    /// Transaction count of the relayer's own account, pending included.
    async fn get_relayer_nonce(&self) -> ChainResult<u64>;

    /// Current gas price in wei.
    async fn get_gas_price(&self) -> ChainResult<u128>;

    /// Broadcast a signed transaction and return its hash once accepted.
    async fn submit(&self, signed_tx: Bytes) -> ChainResult<TxHash>;

    /// Wait until `tx_hash` is mined or `timeout` elapses.
    async fn await_receipt(&self, tx_hash: TxHash, timeout: Duration) -> ChainResult<Receipt>;

    /// Latest block number.
    async fn get_block_number(&self) -> ChainResult<u64>;

    /// Timestamp of the latest block, used as chain time.
    async fn get_block_timestamp(&self) -> ChainResult<u64>;

    /// The token's EIP-712 `DOMAIN_SEPARATOR()`.
    async fn get_domain_separator(&self, token: Address) -> ChainResult<B256>;
}

/// JSON-RPC implementation of [`ChainClient`] with failover support.
#[derive(Clone)]
pub struct RpcChainClient {
    /// List of providers (primary + failovers).
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    /// Configuration.
    config: BlockchainConfig,
    /// Address whose nonce `get_relayer_nonce` reports.
    relayer: Address,
    /// Request timeout duration.
    timeout_duration: Duration,
    /// Receipt polling budget.
    receipt_policy: ReceiptPolicy,
}

impl RpcChainClient {
    /// Create a new client.
    ///
    /// Fails only on an unparseable primary URL; an unreachable node is
    /// tolerated so the service can start and report itself unhealthy.
    pub async fn new(
        config: BlockchainConfig,
        relayer: Address,
        receipt_policy: ReceiptPolicy,
    ) -> ChainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            ChainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(
            Arc::new(ProviderBuilder::new().connect_http(primary_url))
                as Arc<dyn Provider + Send + Sync>,
        );

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(
                    Arc::new(ProviderBuilder::new().connect_http(url))
                        as Arc<dyn Provider + Send + Sync>,
                );
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            relayer,
            timeout_duration,
            receipt_policy,
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.chain_id,
                    "Chain client initialized"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Chain client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> ChainResult<()> {
        let chain_id = self.get_chain_id().await?;
        if chain_id.0 != self.config.chain_id {
            return Err(ChainError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Get the chain ID from the RPC.
    pub async fn get_chain_id(&self) -> ChainResult<ChainId> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_chain_id()).await {
                Ok(Ok(result)) => return Ok(ChainId(result)),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "RPC timeout, trying next provider");
                }
            }
        }
        metrics::record_rpc_error("get_chain_id");
        Err(ChainError::Rpc("All RPC providers failed".to_string()))
    }

    /// Get a transaction receipt by hash.
    pub async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> ChainResult<Option<TransactionReceipt>> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_transaction_receipt(tx_hash)).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        metrics::record_rpc_error("get_transaction_receipt");
        Err(ChainError::Rpc("All providers failed to get receipt".to_string()))
    }

    /// Execute a read-only contract call against the latest block.
    async fn call_view<C>(&self, to: Address, call: C, op: &'static str) -> ChainResult<C::Return>
    where
        C: SolCall + Send,
    {
        let request = TransactionRequest::default()
            .with_to(to)
            .with_input(call.abi_encode());

        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.call(request.clone())).await {
                Ok(Ok(output)) => {
                    return C::abi_decode_returns(&output)
                        .map_err(|e| ChainError::Abi(format!("{}: {}", op, e)));
                }
                Ok(Err(e)) => tracing::warn!(provider_idx = i, op = op, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, op = op, "RPC timeout"),
            }
        }
        metrics::record_rpc_error(op);
        Err(ChainError::Rpc(format!("All providers failed to {}", op)))
    }

    /// Get the configuration.
    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn get_balance(&self, token: Address, owner: Address) -> ChainResult<U256> {
        self.call_view(token, IERC20Permit::balanceOfCall { account: owner }, "balanceOf")
            .await
    }

    async fn get_relayer_nonce(&self) -> ChainResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = provider.get_transaction_count(self.relayer).pending();
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        metrics::record_rpc_error("get_transaction_count");
        Err(ChainError::Rpc("All providers failed to get transaction count".to_string()))
    }

    async fn get_gas_price(&self) -> ChainResult<u128> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_gas_price()).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        metrics::record_rpc_error("get_gas_price");
        Err(ChainError::Rpc("All providers failed to get gas price".to_string()))
    }

    async fn submit(&self, signed_tx: Bytes) -> ChainResult<TxHash> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.send_raw_transaction(&signed_tx)).await {
                Ok(Ok(pending)) => return Ok(*pending.tx_hash()),
                // The node saw the transaction and said no; another node will agree.
                Ok(Err(RpcError::ErrorResp(payload))) => {
                    tracing::warn!(provider_idx = i, code = payload.code, message = %payload.message, "Transaction rejected");
                    return Err(ChainError::Rejected(payload.message.to_string()));
                }
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        metrics::record_rpc_error("send_raw_transaction");
        Err(ChainError::Rpc("All providers failed to submit transaction".to_string()))
    }

    async fn await_receipt(&self, tx_hash: TxHash, wait: Duration) -> ChainResult<Receipt> {
        let policy = self.receipt_policy;

        let result = timeout(wait, async {
            for poll in 1..=policy.max_polls {
                match self.get_transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => {
                        let status = if receipt.status() {
                            ReceiptStatus::Success
                        } else {
                            ReceiptStatus::Reverted
                        };
                        return Ok(Receipt {
                            tx_hash,
                            status,
                            block_number: receipt.block_number.unwrap_or_default(),
                        });
                    }
                    Ok(None) => tracing::debug!(tx_hash = %tx_hash, poll = poll, "Transaction pending"),
                    Err(e) => tracing::debug!(tx_hash = %tx_hash, poll = poll, error = %e, "Receipt poll failed"),
                }
                sleep(calculate_backoff(poll, policy.base_delay_ms, policy.max_delay_ms)).await;
            }
            Err(ChainError::ReceiptTimeout {
                tx_hash,
                polls: policy.max_polls,
            })
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(ChainError::Timeout(wait.as_secs())),
        }
    }

    async fn get_block_number(&self) -> ChainResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, provider.get_block_number()).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        metrics::record_rpc_error("get_block_number");
        Err(ChainError::Rpc("All providers failed to get block number".to_string()))
    }

    async fn get_block_timestamp(&self) -> ChainResult<u64> {
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = provider.get_block_by_number(BlockNumberOrTag::Latest);
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(Some(block))) => return Ok(block.header.timestamp),
                Ok(Ok(None)) => tracing::warn!(provider_idx = i, "Latest block missing"),
                Ok(Err(e)) => tracing::warn!(provider_idx = i, error = %e, "RPC error"),
                Err(_) => tracing::warn!(provider_idx = i, "RPC timeout"),
            }
        }
        metrics::record_rpc_error("get_block_by_number");
        Err(ChainError::Rpc("All providers failed to get latest block".to_string()))
    }

    async fn get_domain_separator(&self, token: Address) -> ChainResult<B256> {
        self.call_view(token, IERC20Permit::DOMAIN_SEPARATORCall {}, "DOMAIN_SEPARATOR")
            .await
    }
}

impl std::fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcChainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .field("relayer", &self.relayer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BlockchainConfig {
        BlockchainConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            chain_id: 31337,
            rpc_timeout_secs: 1,
            ..BlockchainConfig::default()
        }
    }

    fn fast_policy() -> ReceiptPolicy {
        ReceiptPolicy {
            max_polls: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    #[tokio::test]
    async fn test_client_creation_tolerates_unreachable_node() {
        let result = RpcChainClient::new(test_config(), Address::ZERO, fast_policy()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_primary_url() {
        let mut config = test_config();
        config.rpc_url = "not a url".to_string();
        let result = RpcChainClient::new(config, Address::ZERO, fast_policy()).await;
        assert!(matches!(result, Err(ChainError::Rpc(_))));
    }

    #[tokio::test]
    async fn test_rpc_failover_exhaustion() {
        let mut config = test_config();
        config.failover_urls.push("http://127.0.0.1:2".to_string());

        let client = RpcChainClient::new(config, Address::ZERO, fast_policy()).await.unwrap();
        let result = client.get_chain_id().await;
        assert!(result.unwrap_err().to_string().contains("All RPC providers failed"));
    }

    #[tokio::test]
    async fn test_receipt_wait_is_bounded() {
        let client = RpcChainClient::new(test_config(), Address::ZERO, fast_policy()).await.unwrap();
        let result = client
            .await_receipt(TxHash::repeat_byte(1), Duration::from_secs(30))
            .await;
        assert!(matches!(result, Err(ChainError::ReceiptTimeout { polls: 2, .. })));
    }
}
