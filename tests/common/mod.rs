//! Shared utilities for relay integration tests.
#![allow(dead_code)]

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{keccak256, Address, Bytes, TxHash, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;

use permit_relayer::blockchain::token::{permit_digest, Permit};
use permit_relayer::blockchain::{ChainClient, ChainError, ChainResult, Receipt, ReceiptStatus, RelayerAccount};
use permit_relayer::config::RelayerConfig;
use permit_relayer::lifecycle::startup::{assemble, Relayer};
use permit_relayer::relay::request::PermitSignature;
use permit_relayer::relay::{AttemptId, RelayRequest, RelayState};
use permit_relayer::{HttpServer, Shutdown};

/// Anvil account #0, pays gas.
pub const RELAYER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
/// Anvil account #1, token holder.
pub const OWNER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
/// Anvil account #2, an unrelated signer.
pub const STRANGER_KEY: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

pub const PERMIT_SELECTOR: [u8; 4] = [0xd5, 0x05, 0xac, 0xcf];
pub const TRANSFER_FROM_SELECTOR: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd];

pub const TOKEN: Address = Address::repeat_byte(0xaa);
pub const RECIPIENT: Address = Address::repeat_byte(0x22);
pub const DOMAIN_SEPARATOR: B256 = B256::repeat_byte(0x42);

pub fn one_token() -> U256 {
    U256::from(1_000_000_000_000_000_000u64)
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn signer(key: &str) -> PrivateKeySigner {
    key.parse().unwrap()
}

pub fn relayer_address() -> Address {
    signer(RELAYER_KEY).address()
}

/// One accepted transaction, as the mock node saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub hash: TxHash,
    pub selector: [u8; 4],
    pub nonce: u64,
}

/// Scripted in-memory ledger.
///
/// Balances, reverts and pre-mempool rejections are set by the test; every
/// call is counted so tests can assert which steps touched the chain.
#[derive(Debug)]
pub struct MockChain {
    balances: Mutex<HashMap<(Address, Address), U256>>,
    submitted: Mutex<Vec<Submitted>>,
    relayer_nonce: AtomicU64,
    block_number: AtomicU64,
    pub reject_next: AtomicU32,
    pub revert_permit: AtomicBool,
    pub revert_transfer: AtomicBool,
    pub unreachable: AtomicBool,
    /// Never mine the permit / transfer: receipt polling runs out.
    pub receipt_timeout_permit: AtomicBool,
    pub receipt_timeout_transfer: AtomicBool,
    /// Milliseconds to wait before answering a transfer receipt poll.
    pub transfer_receipt_delay_ms: AtomicU64,
    pub balance_calls: AtomicU32,
    pub submit_calls: AtomicU32,
    pub timestamp_calls: AtomicU32,
    pub domain_calls: AtomicU32,
    pub nonce_collisions: AtomicU32,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            balances: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            relayer_nonce: AtomicU64::new(0),
            block_number: AtomicU64::new(1_000),
            reject_next: AtomicU32::new(0),
            revert_permit: AtomicBool::new(false),
            revert_transfer: AtomicBool::new(false),
            unreachable: AtomicBool::new(false),
            receipt_timeout_permit: AtomicBool::new(false),
            receipt_timeout_transfer: AtomicBool::new(false),
            transfer_receipt_delay_ms: AtomicU64::new(0),
            balance_calls: AtomicU32::new(0),
            submit_calls: AtomicU32::new(0),
            timestamp_calls: AtomicU32::new(0),
            domain_calls: AtomicU32::new(0),
            nonce_collisions: AtomicU32::new(0),
        })
    }

    pub fn set_balance(&self, owner: Address, amount: U256) {
        self.balances.lock().unwrap().insert((TOKEN, owner), amount);
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.submitted.lock().unwrap().clone()
    }

    /// Calls that reached the chain in any form.
    pub fn total_calls(&self) -> u32 {
        self.balance_calls.load(Ordering::SeqCst)
            + self.submit_calls.load(Ordering::SeqCst)
            + self.timestamp_calls.load(Ordering::SeqCst)
            + self.domain_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> ChainResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_balance(&self, token: Address, owner: Address) -> ChainResult<U256> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(token, owner))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn get_relayer_nonce(&self) -> ChainResult<u64> {
        self.check_reachable()?;
        Ok(self.relayer_nonce.load(Ordering::SeqCst))
    }

    async fn get_gas_price(&self) -> ChainResult<u128> {
        self.check_reachable()?;
        Ok(1_000_000_000)
    }

    async fn submit(&self, signed_tx: Bytes) -> ChainResult<TxHash> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        // Yield so concurrent submitters interleave if they are not serialized.
        tokio::task::yield_now().await;

        if self
            .reject_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ChainError::Rejected("replacement transaction underpriced".to_string()));
        }

        let tx = TxEnvelope::decode_2718(&mut signed_tx.as_ref())
            .map_err(|e| ChainError::Rejected(format!("undecodable transaction: {e}")))?;
        let selector: [u8; 4] = tx.input()[..4].try_into().unwrap();
        let nonce = tx.nonce();

        if self
            .relayer_nonce
            .compare_exchange(nonce, nonce + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.nonce_collisions.fetch_add(1, Ordering::SeqCst);
            return Err(ChainError::Rejected("nonce too low".to_string()));
        }

        let hash = keccak256(&signed_tx);
        self.submitted.lock().unwrap().push(Submitted {
            hash,
            selector,
            nonce,
        });
        Ok(hash)
    }

    async fn await_receipt(&self, tx_hash: TxHash, timeout: Duration) -> ChainResult<Receipt> {
        self.check_reachable()?;
        let selector = self
            .submitted()
            .into_iter()
            .find(|s| s.hash == tx_hash)
            .map(|s| s.selector)
            .ok_or(ChainError::ReceiptTimeout { tx_hash, polls: 1 })?;

        let unmined = if selector == PERMIT_SELECTOR {
            &self.receipt_timeout_permit
        } else {
            &self.receipt_timeout_transfer
        };
        if unmined.load(Ordering::SeqCst) {
            tokio::time::sleep(timeout.min(Duration::from_millis(50))).await;
            return Err(ChainError::ReceiptTimeout { tx_hash, polls: 3 });
        }

        let reverted = if selector == PERMIT_SELECTOR {
            self.revert_permit.load(Ordering::SeqCst)
        } else {
            let delay = self.transfer_receipt_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            self.revert_transfer.load(Ordering::SeqCst)
        };

        Ok(Receipt {
            tx_hash,
            status: if reverted {
                ReceiptStatus::Reverted
            } else {
                ReceiptStatus::Success
            },
            block_number: self.block_number.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn get_block_number(&self) -> ChainResult<u64> {
        self.check_reachable()?;
        Ok(self.block_number.load(Ordering::SeqCst))
    }

    async fn get_block_timestamp(&self) -> ChainResult<u64> {
        self.timestamp_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(unix_now())
    }

    async fn get_domain_separator(&self, _token: Address) -> ChainResult<B256> {
        self.domain_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(DOMAIN_SEPARATOR)
    }
}

/// Config tuned for fast tests.
pub fn test_config() -> RelayerConfig {
    let mut config = RelayerConfig::default();
    config.relay.receipt_timeout_secs = 5;
    config.relay.max_submit_attempts = 3;
    config.observability.metrics_enabled = false;
    config
}

pub fn build_relayer(chain: Arc<MockChain>, config: &RelayerConfig) -> Relayer {
    let account = RelayerAccount::from_private_key(RELAYER_KEY, config.blockchain.chain_id).unwrap();
    assemble(config, chain, account).unwrap()
}

/// A permit for `amount` signed by `signer_key`, claiming to come from `owner`.
pub fn signed_request_as(
    signer_key: &str,
    owner: Address,
    amount: U256,
    deadline: u64,
    nonce: u64,
) -> RelayRequest {
    let permit = Permit {
        owner,
        spender: relayer_address(),
        value: amount,
        nonce: U256::from(nonce),
        deadline: U256::from(deadline),
    };
    let digest = permit_digest(DOMAIN_SEPARATOR, &permit);
    let sig = signer(signer_key).sign_hash_sync(&digest).unwrap();

    RelayRequest {
        token: TOKEN,
        sender: owner,
        recipient: RECIPIENT,
        amount,
        deadline: U256::from(deadline),
        nonce: U256::from(nonce),
        signature: PermitSignature {
            v: 27 + sig.v() as u64,
            r: B256::from(sig.r().to_be_bytes::<32>()),
            s: B256::from(sig.s().to_be_bytes::<32>()),
        },
    }
}

/// A valid permit from the owner account.
pub fn signed_request(amount: U256, deadline: u64, nonce: u64) -> RelayRequest {
    signed_request_as(OWNER_KEY, signer(OWNER_KEY).address(), amount, deadline, nonce)
}

/// Wire form of a request, as a client would post it.
pub fn request_json(request: &RelayRequest) -> serde_json::Value {
    serde_json::json!({
        "token_address": request.token.to_string(),
        "sender": request.sender.to_string(),
        "recipient": request.recipient.to_string(),
        "amount": request.amount.to_string(),
        "deadline": request.deadline.to_string(),
        "nonce": request.nonce.to_string(),
        "signature": {
            "v": request.signature.v,
            "r": request.signature.r.to_string(),
            "s": request.signature.s.to_string(),
        }
    })
}

/// Poll the store until `id` reaches a terminal state.
pub async fn wait_terminal(relayer: &Relayer, id: &AttemptId) -> RelayState {
    for _ in 0..200 {
        if let Some(summary) = relayer.service.status(id) {
            if summary.state.is_terminal() {
                return summary.state;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("attempt {id} never reached a terminal state");
}

/// Start the HTTP server on an ephemeral port.
pub async fn start_server(relayer: &Relayer, config: &RelayerConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, relayer.service.clone());
    let signalled = shutdown.signalled();
    tokio::spawn(async move {
        server.run(listener, signalled).await.unwrap();
    });
    (addr, shutdown)
}
