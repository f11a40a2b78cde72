//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → RelayerConfig (validated, immutable)
//!     → handed to lifecycle::startup, which builds every subsystem
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - The relayer private key never lives in the file, only in the environment

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    BlockchainConfig, ListenerConfig, ObservabilityConfig, RelayConfig, RelayerConfig,
    SecurityConfig, TimeoutConfig, TokenConfig,
};
