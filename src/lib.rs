//! Gasless ERC-20 transfers via EIP-2612 permits.
//!
//! The relayer accepts an owner-signed permit plus a desired transfer, then
//! pays gas for `permit` followed by `transferFrom` from its own account.

pub mod blockchain;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;
pub mod resilience;

pub use config::schema::RelayerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::RelayService;
