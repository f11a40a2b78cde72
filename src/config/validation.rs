//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, bump percent >= 100)
//! - Check that addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::RelayerConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RelayerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be > 0"));
    }

    let chain = &config.blockchain;
    if chain.rpc_url.trim().is_empty() {
        errors.push(ValidationError::new("blockchain.rpc_url", "must not be empty"));
    } else if url::Url::parse(&chain.rpc_url).is_err() {
        errors.push(ValidationError::new(
            "blockchain.rpc_url",
            format!("'{}' is not a valid URL", chain.rpc_url),
        ));
    }
    for url_str in &chain.failover_urls {
        if url::Url::parse(url_str).is_err() {
            errors.push(ValidationError::new(
                "blockchain.failover_urls",
                format!("'{}' is not a valid URL", url_str),
            ));
        }
    }
    if chain.chain_id == 0 {
        errors.push(ValidationError::new("blockchain.chain_id", "must be > 0"));
    }
    if chain.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("blockchain.rpc_timeout_secs", "must be > 0"));
    }
    if chain.gas_limit == 0 {
        errors.push(ValidationError::new("blockchain.gas_limit", "must be > 0"));
    }
    if chain.gas_price_bump_percent < 100 {
        errors.push(ValidationError::new(
            "blockchain.gas_price_bump_percent",
            "must be >= 100",
        ));
    }
    if chain.private_key_env.trim().is_empty() {
        errors.push(ValidationError::new(
            "blockchain.private_key_env",
            "must name an environment variable",
        ));
    }

    let relay = &config.relay;
    if relay.receipt_timeout_secs == 0 {
        errors.push(ValidationError::new("relay.receipt_timeout_secs", "must be > 0"));
    }
    if relay.receipt_max_polls == 0 {
        errors.push(ValidationError::new("relay.receipt_max_polls", "must be > 0"));
    }
    if relay.receipt_poll_base_ms > relay.receipt_poll_max_ms {
        errors.push(ValidationError::new(
            "relay.receipt_poll_base_ms",
            "must not exceed relay.receipt_poll_max_ms",
        ));
    }
    if relay.max_submit_attempts == 0 {
        errors.push(ValidationError::new("relay.max_submit_attempts", "must be > 0"));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
