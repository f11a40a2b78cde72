//! Transaction preparation.
//!
//! # Responsibilities
//! - Read the relayer nonce and gas price fresh for every transaction
//! - Apply the configured gas price bump and ceiling
//! - Produce an [`UnsignedCall`] ready for the relayer account to sign

use alloy::primitives::{Address, Bytes, U256};

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::{BlockchainConfig, ChainError, ChainResult, UnsignedCall};

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Gas settings applied to every relayed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPolicy {
    /// Gas limit for each call.
    pub gas_limit: u64,
    /// Percentage applied to the node's gas price.
    pub bump_percent: u32,
    /// Refuse to sign above this price.
    pub max_gas_price_gwei: u64,
    /// EIP-155 chain id.
    pub chain_id: u64,
}

impl From<&BlockchainConfig> for GasPolicy {
    fn from(config: &BlockchainConfig) -> Self {
        Self {
            gas_limit: config.gas_limit,
            bump_percent: config.gas_price_bump_percent,
            max_gas_price_gwei: config.max_gas_price_gwei,
            chain_id: config.chain_id,
        }
    }
}

impl GasPolicy {
    /// Apply the bump to a node-reported price and enforce the ceiling.
    ///
    /// Integer arithmetic only; the ceiling is checked against the bumped price.
    pub fn adjust(&self, node_price: u128) -> ChainResult<u128> {
        let adjusted = node_price.saturating_mul(self.bump_percent as u128) / 100;
        let adjusted_gwei = adjusted / WEI_PER_GWEI;
        if adjusted_gwei > self.max_gas_price_gwei as u128 {
            return Err(ChainError::GasPriceTooHigh {
                current_gwei: u64::try_from(adjusted_gwei).unwrap_or(u64::MAX),
                max_gwei: self.max_gas_price_gwei,
            });
        }
        Ok(adjusted)
    }

    /// Build a call to `to` with the relayer's current nonce and gas price.
    ///
    /// Callers must hold the submission lock from here until the signed
    /// transaction has been submitted.
    pub async fn prepare(
        &self,
        chain: &dyn ChainClient,
        to: Address,
        input: Bytes,
    ) -> ChainResult<UnsignedCall> {
        let nonce = chain.get_relayer_nonce().await?;
        let gas_price = self.adjust(chain.get_gas_price().await?)?;

        Ok(UnsignedCall {
            to,
            input,
            nonce,
            gas_price,
            gas_limit: self.gas_limit,
            chain_id: self.chain_id,
            value: U256::ZERO,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(bump_percent: u32, max_gas_price_gwei: u64) -> GasPolicy {
        GasPolicy {
            gas_limit: 100_000,
            bump_percent,
            max_gas_price_gwei,
            chain_id: 1,
        }
    }

    #[test]
    fn test_bump_is_integer_percentage() {
        let price = 10 * WEI_PER_GWEI;
        assert_eq!(policy(100, 500).adjust(price).unwrap(), price);
        assert_eq!(policy(125, 500).adjust(price).unwrap(), 12_500_000_000);
    }

    #[test]
    fn test_ceiling_applies_after_bump() {
        let price = 450 * WEI_PER_GWEI;
        assert!(policy(100, 500).adjust(price).is_ok());
        let err = policy(120, 500).adjust(price).unwrap_err();
        assert_eq!(
            err,
            ChainError::GasPriceTooHigh {
                current_gwei: 540,
                max_gwei: 500
            }
        );
    }

    #[test]
    fn test_from_config() {
        let config = BlockchainConfig::default();
        let policy = GasPolicy::from(&config);
        assert_eq!(policy.gas_limit, 100_000);
        assert_eq!(policy.bump_percent, 100);
    }
}
