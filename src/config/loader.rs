//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::RelayerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides the RPC endpoint from the environment.
pub const RPC_URL_ENV_VAR: &str = "RELAYER_RPC_URL";
/// Overrides the chain id from the environment.
pub const CHAIN_ID_ENV_VAR: &str = "RELAYER_CHAIN_ID";
/// Overrides the listener bind address from the environment.
pub const BIND_ADDRESS_ENV_VAR: &str = "RELAYER_BIND_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, value } => {
                write!(f, "Invalid value '{}' in environment variable {}", value, var)
            }
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RelayerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config = parse_config(&content)?;
    finish(config)
}

/// Build a configuration from defaults plus environment overrides only.
pub fn load_from_env() -> Result<RelayerConfig, ConfigError> {
    finish(RelayerConfig::default())
}

/// Parse TOML text without touching the environment.
pub fn parse_config(content: &str) -> Result<RelayerConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

fn finish(mut config: RelayerConfig) -> Result<RelayerConfig, ConfigError> {
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply environment overrides using the given lookup.
pub fn apply_env_overrides<F>(config: &mut RelayerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(RPC_URL_ENV_VAR) {
        config.blockchain.rpc_url = url;
    }
    if let Some(raw) = lookup(CHAIN_ID_ENV_VAR) {
        config.blockchain.chain_id = raw.trim().parse().map_err(|_| ConfigError::Env {
            var: CHAIN_ID_ENV_VAR,
            value: raw.clone(),
        })?;
    }
    if let Some(addr) = lookup(BIND_ADDRESS_ENV_VAR) {
        config.listener.bind_address = addr;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_overrides() {
        let mut config = RelayerConfig::default();
        apply_env_overrides(&mut config, |var| match var {
            RPC_URL_ENV_VAR => Some("https://sepolia.example.org".to_string()),
            CHAIN_ID_ENV_VAR => Some("11155111".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.blockchain.rpc_url, "https://sepolia.example.org");
        assert_eq!(config.blockchain.chain_id, 11155111);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_bad_chain_id_override() {
        let mut config = RelayerConfig::default();
        let err = apply_env_overrides(&mut config, |var| {
            (var == CHAIN_ID_ENV_VAR).then(|| "mainnet".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(CHAIN_ID_ENV_VAR));
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[relay]\nmax_submit_attempts = 0").unwrap();

        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.field == "relay.max_submit_attempts"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(matches!(parse_config("[relay"), Err(ConfigError::Parse(_))));
    }
}
