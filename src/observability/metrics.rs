//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_exchanges_total` (counter): finished exchanges by outcome and status
//! - `gateway_exchange_duration_seconds` (histogram): dispatch-to-completion latency
//! - `gateway_exchanges_in_flight` (gauge): exchanges currently running
//!
//! # Design Decisions
//! - Macros record into whatever recorder is installed; without one they
//!   are no-ops, so tests need no setup
//! - The exporter runs its own listener, separate from the relay endpoint

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and start its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one finished exchange.
///
/// `status` is only known for completed exchanges.
pub fn record_exchange(outcome: &'static str, status: Option<u16>, started: Instant) {
    let status = status.map_or_else(|| "none".to_string(), |s| s.to_string());

    counter!("gateway_exchanges_total", "outcome" => outcome, "status" => status).increment(1);
    histogram!("gateway_exchange_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

/// Counts an exchange as in flight for as long as it lives.
#[derive(Debug)]
pub struct InFlightGuard(());

impl InFlightGuard {
    pub fn new() -> Self {
        gauge!("gateway_exchanges_in_flight").increment(1.0);
        Self(())
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!("gateway_exchanges_in_flight").decrement(1.0);
    }
}
