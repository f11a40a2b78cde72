//! Off-chain permit checks.
//!
//! Order matters: shape first (no I/O), then the deadline against the local
//! clock, then the deadline against chain time, then EIP-712 signer recovery
//! against the token's domain separator. Nothing here mutates the chain.

use alloy::primitives::{uint, Address, Signature, B256, U256};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::ChainError;
use crate::blockchain::token::{permit_digest, Permit};
use crate::relay::error::{RelayError, ValidationError};
use crate::relay::request::{AttemptId, PermitSignature, RelayRequest};

/// secp256k1 group order divided by two. Signatures with a larger `s` are
/// malleable duplicates and are refused.
const SECP256K1N_HALF: U256 =
    uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// Validates permit requests before any chain-mutating step.
#[derive(Debug, Clone)]
pub struct SignatureValidator {
    spender: Address,
    verify_signatures: bool,
}

impl SignatureValidator {
    /// `spender` is the relayer address the permit must name.
    pub fn new(spender: Address, verify_signatures: bool) -> Self {
        Self {
            spender,
            verify_signatures,
        }
    }

    pub fn spender(&self) -> Address {
        self.spender
    }

    /// Run every check in order.
    ///
    /// Returns the recovered signer when recovery was performed. Chain read
    /// failures surface as [`RelayError::Chain`]; everything else is a
    /// [`RelayError::Validation`].
    pub async fn validate(
        &self,
        request: &RelayRequest,
        chain: &dyn ChainClient,
    ) -> Result<Option<Address>, RelayError> {
        check_shape(request)?;
        check_deadline(request.deadline, unix_now())?;

        let chain_now = chain.get_block_timestamp().await?;
        check_deadline(request.deadline, chain_now)?;

        if !self.verify_signatures {
            return Ok(None);
        }

        let domain_separator = chain.get_domain_separator(request.token).await?;
        let recovered = recover_signer(request, self.spender, domain_separator)?;
        if recovered != request.sender {
            return Err(ValidationError::SignerMismatch {
                recovered,
                expected: request.sender,
            }
            .into());
        }
        Ok(Some(recovered))
    }

    /// Report whether the signature is valid without relaying anything.
    ///
    /// Recovery always runs here, regardless of `verify_signatures`. Only a
    /// failure to read the domain separator is an `Err`.
    pub async fn verify(
        &self,
        request: &RelayRequest,
        chain: &dyn ChainClient,
    ) -> Result<Verification, ChainError> {
        let attempt_id = request.attempt_id();
        let rejected = |error: ValidationError, recovered_signer| Verification {
            valid: false,
            recovered_signer,
            attempt_id,
            error: Some(error.to_string()),
        };

        if let Err(e) = check_shape(request) {
            return Ok(rejected(e, None));
        }
        let domain_separator = chain.get_domain_separator(request.token).await?;
        let recovered = match recover_signer(request, self.spender, domain_separator) {
            Ok(address) => address,
            Err(e) => return Ok(rejected(e, None)),
        };
        if recovered != request.sender {
            let mismatch = ValidationError::SignerMismatch {
                recovered,
                expected: request.sender,
            };
            return Ok(rejected(mismatch, Some(recovered)));
        }
        if let Err(e) = check_deadline(request.deadline, unix_now()) {
            return Ok(rejected(e, Some(recovered)));
        }

        Ok(Verification {
            valid: true,
            recovered_signer: Some(recovered),
            attempt_id,
            error: None,
        })
    }
}

/// Outcome of a dry-run signature check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub valid: bool,
    pub recovered_signer: Option<Address>,
    pub attempt_id: AttemptId,
    pub error: Option<String>,
}

/// Field-level checks that need no I/O.
pub fn check_shape(request: &RelayRequest) -> Result<(), ValidationError> {
    if request.amount.is_zero() {
        return Err(ValidationError::ZeroAmount);
    }
    if request.deadline.is_zero() {
        return Err(ValidationError::InvalidField {
            field: "deadline",
            reason: "must be a positive timestamp".to_string(),
        });
    }
    parity_of(&request.signature)?;

    let r = U256::from_be_bytes(request.signature.r.0);
    let s = U256::from_be_bytes(request.signature.s.0);
    if r.is_zero() {
        return Err(ValidationError::InvalidSignature("r is zero"));
    }
    if s.is_zero() {
        return Err(ValidationError::InvalidSignature("s is zero"));
    }
    if s > SECP256K1N_HALF {
        return Err(ValidationError::InvalidSignature("s is in the upper half of the curve order"));
    }
    Ok(())
}

/// A permit is void once `now` reaches its deadline.
pub fn check_deadline(deadline: U256, now: u64) -> Result<(), ValidationError> {
    if deadline <= U256::from(now) {
        return Err(ValidationError::DeadlineExpired { deadline, now });
    }
    Ok(())
}

pub fn parity_of(signature: &PermitSignature) -> Result<bool, ValidationError> {
    signature
        .y_parity()
        .ok_or(ValidationError::InvalidV(signature.v))
}

/// Recover the address that signed the permit described by `request`.
pub fn recover_signer(
    request: &RelayRequest,
    spender: Address,
    domain_separator: B256,
) -> Result<Address, ValidationError> {
    let parity = parity_of(&request.signature)?;
    let permit = Permit {
        owner: request.sender,
        spender,
        value: request.amount,
        nonce: request.nonce,
        deadline: request.deadline,
    };
    let digest = permit_digest(domain_separator, &permit);
    let signature = Signature::new(
        U256::from_be_bytes(request.signature.r.0),
        U256::from_be_bytes(request.signature.s.0),
        parity,
    );
    signature
        .recover_address_from_prehash(&digest)
        .map_err(|_| ValidationError::InvalidSignature("signer could not be recovered"))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
