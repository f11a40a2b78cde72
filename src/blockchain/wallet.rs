//! Relayer account and transaction signing.
//!
//! # Security
//! - The private key is loaded once, from an environment variable
//! - Keys are never logged or serialized; `Debug` prints the address only
//! - Nonces are not tracked here; they are read fresh from the chain for
//!   every transaction by the orchestrator

use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;

use crate::blockchain::types::{ChainError, ChainResult, UnsignedCall};

/// Default environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "RELAYER_PRIVATE_KEY";

/// The account that pays gas for every relayed transaction.
#[derive(Clone)]
pub struct RelayerAccount {
    address: Address,
    wallet: EthereumWallet,
    chain_id: u64,
}

impl RelayerAccount {
    /// Create an account from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    /// * `chain_id` - Chain ID for EIP-155 replay protection
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> ChainResult<Self> {
        let key_hex = private_key_hex
            .trim()
            .strip_prefix("0x")
            .unwrap_or(private_key_hex.trim());

        // The parse error is deliberately dropped: it may echo key material.
        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|_| ChainError::Signing("Invalid private key format".to_string()))?;
        let address = signer.address();

        tracing::info!(address = %address, chain_id = chain_id, "Relayer account initialized");

        Ok(Self {
            address,
            wallet: EthereumWallet::from(signer),
            chain_id,
        })
    }

    /// Load the account from the named environment variable.
    pub fn from_env(var: &str, chain_id: u64) -> ChainResult<Self> {
        let private_key = std::env::var(var).map_err(|_| {
            ChainError::Signing(format!("Environment variable {} not set", var))
        })?;

        Self::from_private_key(&private_key, chain_id)
    }

    /// The relayer's on-chain address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Chain ID this account signs for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign a contract call, returning the EIP-2718 encoded transaction.
    pub async fn sign(&self, call: &UnsignedCall) -> ChainResult<Bytes> {
        let request = TransactionRequest::default()
            .with_from(self.address)
            .with_to(call.to)
            .with_value(call.value)
            .with_input(call.input.clone())
            .with_nonce(call.nonce)
            .with_gas_price(call.gas_price)
            .with_gas_limit(call.gas_limit)
            .with_chain_id(call.chain_id);

        let envelope: TxEnvelope = request
            .build(&self.wallet)
            .await
            .map_err(|e| ChainError::Signing(format!("Failed to sign transaction: {}", e)))?;

        Ok(envelope.encoded_2718().into())
    }
}

impl std::fmt::Debug for RelayerAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerAccount")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}
