//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define helper metrics (connections, transactions, latency, body size)
//! - Expose a Prometheus-compatible endpoint when enabled
//!
//! # Metrics
//! - `helper_connections_active` (gauge): connections currently open
//! - `helper_transactions_total` (counter): finished transactions by outcome
//! - `helper_transaction_duration_seconds` (histogram): accept to close
//! - `helper_response_body_bytes` (histogram): relayed body sizes
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; with no recorder
//!   installed every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const CONNECTIONS_ACTIVE: &str = "helper_connections_active";
pub const TRANSACTIONS_TOTAL: &str = "helper_transactions_total";
pub const TRANSACTION_DURATION: &str = "helper_transaction_duration_seconds";
pub const RESPONSE_BODY_BYTES: &str = "helper_response_body_bytes";

/// Start the Prometheus exporter on `addr`. Needs a running Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

pub fn connection_opened() {
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

pub fn connection_closed() {
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

pub fn record_transaction(outcome: &'static str, started: Instant) {
    counter!(TRANSACTIONS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(TRANSACTION_DURATION).record(started.elapsed().as_secs_f64());
}

pub fn record_response_body(len: usize) {
    histogram!(RESPONSE_BODY_BYTES).record(len as f64);
}
