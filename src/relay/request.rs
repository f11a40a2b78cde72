//! Relay request: wire shape and typed value.
//!
//! [`RelayRequestBody`] mirrors the JSON clients send, with every field
//! optional so that absent fields are reported by name. [`RelayRequestBody::parse`]
//! is the only way to obtain a [`RelayRequest`]; nothing downstream ever sees
//! a partially-checked map.

use alloy::primitives::{keccak256, Address, B256, U256};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use std::fmt;
use std::str::FromStr;

use crate::relay::error::ValidationError;

/// An unsigned integer as clients send it: JSON number or decimal string.
///
/// Numbers keep their literal text so that amounts wider than 64 bits never
/// pass through a float.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UintField {
    Number(String),
    Text(String),
}

impl<'de> Deserialize<'de> for UintField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let literal = raw.get();
        if literal.starts_with('"') {
            serde_json::from_str(literal)
                .map(UintField::Text)
                .map_err(de::Error::custom)
        } else {
            Ok(UintField::Number(literal.to_string()))
        }
    }
}

impl UintField {
    fn to_u256(&self, field: &'static str) -> Result<U256, ValidationError> {
        let digits = match self {
            UintField::Number(literal) => literal.as_str(),
            UintField::Text(text) => text.trim(),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidField {
                field,
                reason: "expected a non-negative decimal integer".to_string(),
            });
        }
        U256::from_str_radix(digits, 10).map_err(|_| ValidationError::InvalidField {
            field,
            reason: "does not fit in 256 bits".to_string(),
        })
    }

    fn to_u64(&self, field: &'static str) -> Result<u64, ValidationError> {
        let value = self.to_u256(field)?;
        u64::try_from(value).map_err(|_| ValidationError::InvalidField {
            field,
            reason: "out of range".to_string(),
        })
    }
}

/// Signature components as sent on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SignatureBody {
    pub v: Option<UintField>,
    pub r: Option<String>,
    pub s: Option<String>,
}

/// Request body of `/submit-transaction` and `/verify-signature`.
///
/// Must be read with `serde_json::from_slice`/`from_str`: numeric fields
/// capture their raw text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RelayRequestBody {
    pub token_address: Option<String>,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub amount: Option<UintField>,
    pub deadline: Option<UintField>,
    pub nonce: Option<UintField>,
    pub signature: Option<SignatureBody>,
}

impl RelayRequestBody {
    /// Check presence and format of every field, in wire order.
    pub fn parse(&self) -> Result<RelayRequest, ValidationError> {
        let token = parse_address("token_address", required("token_address", &self.token_address)?)?;
        let sender = parse_address("sender", required("sender", &self.sender)?)?;
        let recipient = parse_address("recipient", required("recipient", &self.recipient)?)?;
        let amount = required("amount", &self.amount)?.to_u256("amount")?;
        let deadline = required("deadline", &self.deadline)?.to_u256("deadline")?;
        let nonce = required("nonce", &self.nonce)?.to_u256("nonce")?;

        let signature = required("signature", &self.signature)?;
        let v = required("signature.v", &signature.v)?.to_u64("signature.v")?;
        let r = parse_word("signature.r", required("signature.r", &signature.r)?)?;
        let s = parse_word("signature.s", required("signature.s", &signature.s)?)?;

        Ok(RelayRequest {
            token,
            sender,
            recipient,
            amount,
            deadline,
            nonce,
            signature: PermitSignature { v, r, s },
        })
    }
}

fn required<'a, T>(field: &'static str, value: &'a Option<T>) -> Result<&'a T, ValidationError> {
    value.as_ref().ok_or(ValidationError::MissingField(field))
}

fn parse_address(field: &'static str, raw: &str) -> Result<Address, ValidationError> {
    let raw = raw.trim();
    let hex = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"));
    match hex {
        Some(h) if h.len() == 40 => Address::from_str(h).map_err(|_| ValidationError::InvalidField {
            field,
            reason: "not valid hex".to_string(),
        }),
        _ => Err(ValidationError::InvalidField {
            field,
            reason: "expected a 0x-prefixed 20-byte hex address".to_string(),
        }),
    }
}

fn parse_word(field: &'static str, raw: &str) -> Result<B256, ValidationError> {
    let raw = raw.trim();
    let hex = raw.strip_prefix("0x").unwrap_or(raw);
    if hex.len() != 64 {
        return Err(ValidationError::InvalidField {
            field,
            reason: "expected 32 bytes of hex".to_string(),
        });
    }
    B256::from_str(hex).map_err(|_| ValidationError::InvalidField {
        field,
        reason: "not valid hex".to_string(),
    })
}

/// Signature over the permit, as supplied by the token holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSignature {
    /// Recovery id as sent: 27/28, 0/1, or EIP-155 adjusted.
    pub v: u64,
    pub r: B256,
    pub s: B256,
}

impl PermitSignature {
    /// y-parity encoded by `v`, if `v` is a recognised form.
    pub fn y_parity(&self) -> Option<bool> {
        match self.v {
            0 | 27 => Some(false),
            1 | 28 => Some(true),
            v if v >= 35 => Some((v - 35) % 2 == 1),
            _ => None,
        }
    }

    /// `v` as the token's `permit` expects it (27 or 28).
    pub fn permit_v(&self) -> Option<u8> {
        self.y_parity().map(|odd| if odd { 28 } else { 27 })
    }
}

/// A well-formed relay request. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub token: Address,
    pub sender: Address,
    pub recipient: Address,
    pub amount: U256,
    /// Unix timestamp after which the permit is void.
    pub deadline: U256,
    /// The token's permit nonce for `sender`.
    pub nonce: U256,
    pub signature: PermitSignature,
}

impl RelayRequest {
    /// Deterministic id over token, sender, nonce, amount and deadline.
    ///
    /// Two requests that would consume the same permit share an id.
    pub fn attempt_id(&self) -> AttemptId {
        let mut buf = Vec::with_capacity(20 + 20 + 32 * 3);
        buf.extend_from_slice(self.token.as_slice());
        buf.extend_from_slice(self.sender.as_slice());
        buf.extend_from_slice(&self.nonce.to_be_bytes::<32>());
        buf.extend_from_slice(&self.amount.to_be_bytes::<32>());
        buf.extend_from_slice(&self.deadline.to_be_bytes::<32>());
        AttemptId(keccak256(&buf))
    }
}

/// Identifier of a relay attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(pub B256);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AttemptId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_word("attempt_id", s).map(AttemptId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_json() -> serde_json::Value {
        json!({
            "token_address": "0xAAAaAAaaaAAaAAaaAaAaaaaaaaaaAaaaAaAAAaaa",
            "sender": "0x1111111111111111111111111111111111111111",
            "recipient": "0x2222222222222222222222222222222222222222",
            "amount": "1000000000000000000",
            "deadline": 1_900_000_000u64,
            "nonce": 1,
            "signature": {
                "v": 27,
                "r": format!("0x{}", "ab".repeat(32)),
                "s": format!("0x{}", "0c".repeat(32)),
            }
        })
    }

    fn body(value: serde_json::Value) -> RelayRequestBody {
        body_text(&value.to_string()).unwrap()
    }

    fn body_text(text: &str) -> serde_json::Result<RelayRequestBody> {
        serde_json::from_str(text)
    }

    /// Sample request with `amount` replaced by a bare JSON literal.
    fn with_amount_literal(literal: &str) -> String {
        sample_json()
            .to_string()
            .replace("\"1000000000000000000\"", literal)
    }

    #[test]
    fn test_parse_well_formed_request() {
        let request = body(sample_json()).parse().unwrap();
        assert_eq!(request.amount, U256::from(1_000_000_000_000_000_000u64));
        assert_eq!(request.deadline, U256::from(1_900_000_000u64));
        assert_eq!(request.nonce, U256::from(1u64));
        assert_eq!(request.signature.v, 27);
        assert_eq!(request.signature.r, B256::repeat_byte(0xab));
    }

    #[test]
    fn test_missing_fields_reported_in_wire_order() {
        let mut value = sample_json();
        value.as_object_mut().unwrap().remove("recipient");
        value.as_object_mut().unwrap().remove("nonce");
        assert_eq!(
            body(value).parse().unwrap_err(),
            ValidationError::MissingField("recipient")
        );

        let mut value = sample_json();
        value["signature"].as_object_mut().unwrap().remove("s");
        assert_eq!(
            body(value).parse().unwrap_err(),
            ValidationError::MissingField("signature.s")
        );
    }

    #[test]
    fn test_malformed_values_rejected() {
        let mut value = sample_json();
        value["sender"] = json!("0x1234");
        assert!(matches!(
            body(value).parse(),
            Err(ValidationError::InvalidField { field: "sender", .. })
        ));

        let mut value = sample_json();
        value["amount"] = json!("-5");
        assert!(matches!(
            body(value).parse(),
            Err(ValidationError::InvalidField { field: "amount", .. })
        ));

        let mut value = sample_json();
        value["signature"]["r"] = json!("0xdeadbeef");
        assert!(matches!(
            body(value).parse(),
            Err(ValidationError::InvalidField { field: "signature.r", .. })
        ));
    }

    #[test]
    fn test_amount_accepts_number_and_full_width_string() {
        let mut value = sample_json();
        value["amount"] = json!(42);
        assert_eq!(body(value).parse().unwrap().amount, U256::from(42u64));

        let mut value = sample_json();
        value["amount"] = json!(U256::MAX.to_string());
        assert_eq!(body(value).parse().unwrap().amount, U256::MAX);
    }

    #[test]
    fn test_amount_number_wider_than_u64_is_exact() {
        let parsed = body_text(&with_amount_literal("100000000000000000000"))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(
            parsed.amount,
            U256::from_str_radix("100000000000000000000", 10).unwrap()
        );

        let max = body_text(&with_amount_literal(&U256::MAX.to_string()))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(max.amount, U256::MAX);
    }

    #[test]
    fn test_amount_number_must_be_an_integer() {
        for literal in ["1.5", "-3", "1e18", "true"] {
            let parsed = body_text(&with_amount_literal(literal)).unwrap().parse();
            assert!(
                matches!(parsed, Err(ValidationError::InvalidField { field: "amount", .. })),
                "{literal} accepted"
            );
        }

        let wide = format!("1{}", "0".repeat(78));
        assert!(matches!(
            body_text(&with_amount_literal(&wide)).unwrap().parse(),
            Err(ValidationError::InvalidField { field: "amount", .. })
        ));
    }

    #[test]
    fn test_null_amount_is_missing() {
        let parsed = body_text(&with_amount_literal("null")).unwrap().parse();
        assert_eq!(parsed.unwrap_err(), ValidationError::MissingField("amount"));
    }

    #[test]
    fn test_v_forms() {
        let sig = |v| PermitSignature {
            v,
            r: B256::ZERO,
            s: B256::ZERO,
        };
        assert_eq!(sig(27).permit_v(), Some(27));
        assert_eq!(sig(1).permit_v(), Some(28));
        // chain id 1: 37 = 35 + 2*1 + 0, 38 = parity 1
        assert_eq!(sig(37).permit_v(), Some(27));
        assert_eq!(sig(38).permit_v(), Some(28));
        assert_eq!(sig(29).permit_v(), None);
    }

    #[test]
    fn test_attempt_id_ignores_recipient_and_signature() {
        let request = body(sample_json()).parse().unwrap();
        let mut other = request.clone();
        other.recipient = Address::repeat_byte(0x33);
        other.signature.v = 28;
        assert_eq!(request.attempt_id(), other.attempt_id());

        other.nonce = U256::from(2u64);
        assert_ne!(request.attempt_id(), other.attempt_id());
    }

    #[test]
    fn test_attempt_id_round_trips_through_text() {
        let id = body(sample_json()).parse().unwrap().attempt_id();
        let parsed: AttemptId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("0x12".parse::<AttemptId>().is_err());
    }
}
