//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relayer_http_requests_total` (counter): requests by path, status
//! - `relayer_http_request_duration_seconds` (histogram): latency distribution
//! - `relayer_attempts_total` (counter): terminal attempts by outcome state
//! - `relayer_transactions_submitted_total` (counter): accepted submissions by phase
//! - `relayer_submit_rejections_total` (counter): pre-mempool rejections by phase
//! - `relayer_rpc_errors_total` (counter): failed RPC calls by operation
//! - `relayer_chain_healthy` (gauge): 1=reachable, 0=unreachable

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus recorder"),
    }
}

pub fn record_request(path: &str, status: u16, start: Instant) {
    metrics::counter!(
        "relayer_http_requests_total",
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("relayer_http_request_duration_seconds", "path" => path.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_attempt_outcome(outcome: &str) {
    metrics::counter!("relayer_attempts_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_submission(phase: &'static str) {
    metrics::counter!("relayer_transactions_submitted_total", "phase" => phase).increment(1);
}

pub fn record_submit_rejection(phase: &'static str) {
    metrics::counter!("relayer_submit_rejections_total", "phase" => phase).increment(1);
}

pub fn record_rpc_error(op: &'static str) {
    metrics::counter!("relayer_rpc_errors_total", "op" => op).increment(1);
}

pub fn record_chain_health(healthy: bool) {
    metrics::gauge!("relayer_chain_healthy").set(if healthy { 1.0 } else { 0.0 });
}
