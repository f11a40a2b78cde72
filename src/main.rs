//! Permit relayer entry point.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌─────────────────────────────┐
//!    POST /submit-tx ──► │ http (axum, request id)     │
//!                        └──────────────┬──────────────┘
//!                                       ▼
//!                        ┌─────────────────────────────┐
//!                        │ relay::RelayService         │
//!                        │   └─ TransactionOrchestrator│
//!                        │        ├─ SignatureValidator│
//!                        │        ├─ AttemptStore      │
//!                        │        └─ RelayerAccount    │
//!                        └──────────────┬──────────────┘
//!                                       ▼
//!                        ┌─────────────────────────────┐
//!                        │ blockchain::RpcChainClient  │ ──► JSON-RPC node(s)
//!                        └─────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use permit_relayer::config::{load_config, load_from_env};
use permit_relayer::lifecycle::{bootstrap, signals, Shutdown};
use permit_relayer::observability::{logging, metrics};
use permit_relayer::HttpServer;

#[derive(Parser)]
#[command(name = "permit-relayer", version, about = "Gasless EIP-2612 permit relayer")]
struct Args {
    /// Path to a TOML config file. Defaults plus environment overrides when absent.
    #[arg(short, long, env = "RELAYER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "permit-relayer starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        chain_id = config.blockchain.chain_id,
        await_transfer_receipt = config.relay.await_transfer_receipt,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let relayer = bootstrap(&config).await?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(&config, relayer.service.clone());
    server.run(listener, shutdown.signalled()).await?;

    let summary = relayer.attempts.summary();
    tracing::info!(
        in_flight = summary.in_flight,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Saving attempt snapshot"
    );
    if let Err(e) = relayer.attempts.save_to_file() {
        tracing::error!(error = %e, "Failed to save attempt snapshot");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
