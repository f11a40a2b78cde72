//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relayer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relayer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request hardening.
    pub security: SecurityConfig,

    /// Blockchain integration settings.
    pub blockchain: BlockchainConfig,

    /// Token contract settings.
    pub token: TokenConfig,

    /// Relay orchestration policy.
    pub relay: RelayConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for the HTTP surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    ///
    /// A relay that outlives this keeps running; the caller polls its status.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 300 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 64 * 1024,
        }
    }
}

/// Blockchain integration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Gas limit attached to both the permit and the transfer transaction.
    pub gas_limit: u64,

    /// Percentage applied to the node's gas price (100 = unchanged, 120 = +20%).
    pub gas_price_bump_percent: u32,

    /// Maximum gas price in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,

    /// Name of the environment variable holding the relayer private key.
    pub private_key_env: String,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 1,
            rpc_timeout_secs: 10,
            gas_limit: 100_000,
            gas_price_bump_percent: 100,
            max_gas_price_gwei: 500,
            private_key_env: "RELAYER_PRIVATE_KEY".to_string(),
        }
    }
}

/// Token contract configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TokenConfig {
    /// Path to the token's JSON ABI or build artifact, checked once at startup.
    pub abi_path: Option<String>,
}

/// Relay orchestration policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Upper bound on the wait for a single receipt, in seconds.
    pub receipt_timeout_secs: u64,

    /// Maximum number of receipt polls per transaction.
    pub receipt_max_polls: u32,

    /// Base delay between receipt polls in milliseconds.
    pub receipt_poll_base_ms: u64,

    /// Maximum delay between receipt polls in milliseconds.
    pub receipt_poll_max_ms: u64,

    /// Submissions per phase before giving up on pre-mempool rejections.
    pub max_submit_attempts: u32,

    /// Wait for the transfer receipt before answering the caller.
    ///
    /// When false the transfer is confirmed in the background and the
    /// outcome is available through the status query.
    pub await_transfer_receipt: bool,

    /// Recover the permit signer off-chain before spending gas.
    pub verify_signatures: bool,

    /// Optional JSON snapshot of the attempt store.
    pub attempts_path: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            receipt_timeout_secs: 120,
            receipt_max_polls: 60,
            receipt_poll_base_ms: 500,
            receipt_poll_max_ms: 4_000,
            max_submit_attempts: 3,
            await_transfer_receipt: true,
            verify_signatures: true,
            attempts_path: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
