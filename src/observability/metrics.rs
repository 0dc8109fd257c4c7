//! Metrics collection and exposition.
//!
//! # Metrics
//! - `railswitch_attempts_total` (counter): attempts by provider, source, outcome
//! - `railswitch_attempt_latency_ms` (histogram): attempt latency by provider
//! - `railswitch_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `railswitch_routing_decisions_total` (counter): by currency, provider, backup
//! - `railswitch_failover_total` (counter): failover outcomes by currency
//! - `railswitch_probe_round_duration_ms` (histogram): wall time of a probe round

use std::net::SocketAddr;
use std::time::Duration;

use ::metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_attempt(provider: &str, source: &'static str, success: bool, latency_ms: f64) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "railswitch_attempts_total",
        "provider" => provider.to_string(),
        "source" => source,
        "outcome" => outcome
    )
    .increment(1);
    histogram!("railswitch_attempt_latency_ms", "provider" => provider.to_string()).record(latency_ms);
}

pub fn record_circuit_state(provider: &str, state: CircuitState) {
    gauge!("railswitch_circuit_state", "provider" => provider.to_string()).set(state.gauge_value());
}

pub fn record_routing_decision(currency: &str, provider: &str, is_backup: bool) {
    counter!(
        "railswitch_routing_decisions_total",
        "currency" => currency.to_string(),
        "provider" => provider.to_string(),
        "backup" => if is_backup { "true" } else { "false" }
    )
    .increment(1);
}

/// `outcome` is one of `primary`, `backup`, `failed`.
pub fn record_failover(currency: &str, outcome: &'static str) {
    counter!(
        "railswitch_failover_total",
        "currency" => currency.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_probe_round(elapsed: Duration) {
    histogram!("railswitch_probe_round_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}
