//! Metrics collection and exposition.
//!
//! # Metrics
//! - `httpception_connections_total` (counter): accepted client connections
//! - `httpception_exchanges_total` (counter): finished exchanges by outcome
//! - `httpception_upstream_duration_seconds` (histogram): upstream round trips
//! - `httpception_paused_handlers` (gauge): handlers waiting on the operator
//! - `httpception_observers` (gauge): registered observer sessions
//! - `httpception_commands_total` (counter): applied commands by name
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus
//! recorder.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const CONNECTIONS_TOTAL: &str = "httpception_connections_total";
pub const EXCHANGES_TOTAL: &str = "httpception_exchanges_total";
pub const UPSTREAM_DURATION_SECONDS: &str = "httpception_upstream_duration_seconds";
pub const PAUSED_HANDLERS: &str = "httpception_paused_handlers";
pub const OBSERVERS: &str = "httpception_observers";
pub const COMMANDS_TOTAL: &str = "httpception_commands_total";

/// Install the global Prometheus recorder with a scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics endpoint listening");
    Ok(())
}

pub fn record_connection() {
    counter!(CONNECTIONS_TOTAL).increment(1);
}

/// Count one finished exchange. `outcome` is `forwarded` or an error class.
pub fn record_exchange(outcome: &'static str) {
    counter!(EXCHANGES_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_upstream_duration(started: Instant) {
    histogram!(UPSTREAM_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
}

pub fn set_paused_handlers(count: usize) {
    gauge!(PAUSED_HANDLERS).set(count as f64);
}

pub fn set_observers(count: usize) {
    gauge!(OBSERVERS).set(count as f64);
}

pub fn record_command(command: &'static str) {
    counter!(COMMANDS_TOTAL, "command" => command).increment(1);
}
