//! EIP-2612 token bindings.
//!
//! The relayer only needs a handful of functions from the token, so the
//! interface is declared inline with `sol!`. When an ABI file is configured it
//! is checked once at startup to make sure the deployed token really exposes
//! them.

use alloy::json_abi::JsonAbi;
use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolStruct};
use std::path::Path;

sol! {
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IERC20Permit {
        function balanceOf(address account) external view returns (uint256);
        function DOMAIN_SEPARATOR() external view returns (bytes32);
        function permit(address owner, address spender, uint256 value, uint256 deadline, uint8 v, bytes32 r, bytes32 s) external;
        function transferFrom(address from, address to, uint256 value) external returns (bool);
    }

    /// EIP-2612 typed-data payload.
    #[derive(Debug)]
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }
}

/// Functions the relayer calls on every token.
pub const REQUIRED_FUNCTIONS: [&str; 4] = ["permit", "transferFrom", "balanceOf", "DOMAIN_SEPARATOR"];

/// Error raised while checking a token ABI file.
#[derive(Debug, thiserror::Error)]
pub enum AbiFileError {
    #[error("cannot read ABI file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse ABI file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("token ABI lacks required functions: {0:?}")]
    MissingFunctions(Vec<&'static str>),
}

/// Load a JSON ABI (bare array or build artifact with an `abi` key) and
/// check that it exposes every function in [`REQUIRED_FUNCTIONS`].
pub fn load_token_abi(path: &Path) -> Result<JsonAbi, AbiFileError> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let abi_value = match value {
        serde_json::Value::Object(mut artifact) if artifact.contains_key("abi") => {
            artifact.remove("abi").unwrap_or_default()
        }
        other => other,
    };
    let abi: JsonAbi = serde_json::from_value(abi_value)?;

    let missing: Vec<_> = REQUIRED_FUNCTIONS
        .into_iter()
        .filter(|name| abi.function(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(AbiFileError::MissingFunctions(missing));
    }
    Ok(abi)
}

/// Encode `permit(owner, spender, value, deadline, v, r, s)`.
pub fn encode_permit(
    owner: Address,
    spender: Address,
    value: U256,
    deadline: U256,
    v: u8,
    r: B256,
    s: B256,
) -> Bytes {
    IERC20Permit::permitCall {
        owner,
        spender,
        value,
        deadline,
        v,
        r,
        s,
    }
    .abi_encode()
    .into()
}

/// Encode `transferFrom(from, to, value)`.
pub fn encode_transfer_from(from: Address, to: Address, value: U256) -> Bytes {
    IERC20Permit::transferFromCall { from, to, value }.abi_encode().into()
}

/// EIP-712 digest of a permit under the token's domain separator:
/// `keccak256(0x1901 ‖ domainSeparator ‖ hashStruct(permit))`.
pub fn permit_digest(domain_separator: B256, permit: &Permit) -> B256 {
    let struct_hash = permit.eip712_hash_struct();
    let mut buf = [0u8; 66];
    buf[0] = 0x19;
    buf[1] = 0x01;
    buf[2..34].copy_from_slice(domain_separator.as_slice());
    buf[34..66].copy_from_slice(struct_hash.as_slice());
    keccak256(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use std::io::Write;

    #[test]
    fn test_selectors() {
        let transfer = encode_transfer_from(Address::ZERO, Address::ZERO, U256::from(1));
        assert_eq!(&transfer[..4], &[0x23, 0xb8, 0x72, 0xdd]);

        let permit = encode_permit(
            Address::ZERO,
            Address::ZERO,
            U256::ZERO,
            U256::ZERO,
            27,
            B256::ZERO,
            B256::ZERO,
        );
        assert_eq!(&permit[..4], &[0xd5, 0x05, 0xac, 0xcf]);
        assert_eq!(permit.len(), 4 + 7 * 32);
    }

    #[test]
    fn test_permit_digest_changes_with_domain_and_nonce() {
        let permit = |nonce: u64| Permit {
            owner: address!("0x1111111111111111111111111111111111111111"),
            spender: address!("0x2222222222222222222222222222222222222222"),
            value: U256::from(1_000u64),
            nonce: U256::from(nonce),
            deadline: U256::from(1_900_000_000u64),
        };
        let domain = B256::repeat_byte(0xab);
        let digest = permit_digest(domain, &permit(1));

        assert_eq!(digest, permit_digest(domain, &permit(1)));
        assert_ne!(digest, permit_digest(B256::repeat_byte(0xac), &permit(1)));
        assert_ne!(digest, permit_digest(domain, &permit(2)));
    }

    #[test]
    fn test_load_abi_from_artifact() {
        let abi = serde_json::json!({
            "contractName": "ERC20WithPermit",
            "abi": [
                {"type": "function", "name": "permit", "stateMutability": "nonpayable", "outputs": [],
                 "inputs": [
                    {"name": "owner", "type": "address"}, {"name": "spender", "type": "address"},
                    {"name": "value", "type": "uint256"}, {"name": "deadline", "type": "uint256"},
                    {"name": "v", "type": "uint8"}, {"name": "r", "type": "bytes32"}, {"name": "s", "type": "bytes32"}]},
                {"type": "function", "name": "transferFrom", "stateMutability": "nonpayable",
                 "inputs": [{"name": "from", "type": "address"}, {"name": "to", "type": "address"}, {"name": "value", "type": "uint256"}],
                 "outputs": [{"name": "", "type": "bool"}]},
                {"type": "function", "name": "balanceOf", "stateMutability": "view",
                 "inputs": [{"name": "account", "type": "address"}],
                 "outputs": [{"name": "", "type": "uint256"}]}
            ]
        });
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", abi).unwrap();

        match load_token_abi(file.path()) {
            Err(AbiFileError::MissingFunctions(missing)) => {
                assert_eq!(missing, vec!["DOMAIN_SEPARATOR"]);
            }
            other => panic!("expected missing DOMAIN_SEPARATOR, got {:?}", other.map(|_| ())),
        }
    }
}
