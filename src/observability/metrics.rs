//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_activations_total` (counter): activations by outcome
//! - `lb_listeners_started_total` / `lb_listeners_stopped_total` (counters)
//! - `lb_backend_health` (gauge): 1=healthy, 0=unhealthy
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_activation(outcome: &'static str) {
    metrics::counter!("lb_activations_total", "outcome" => outcome).increment(1);
}

pub fn record_listener_started(kind: &'static str) {
    metrics::counter!("lb_listeners_started_total", "kind" => kind).increment(1);
}

pub fn record_listener_stopped(kind: &'static str) {
    metrics::counter!("lb_listeners_stopped_total", "kind" => kind).increment(1);
}

pub fn record_backend_health(addr: &SocketAddr, healthy: bool) {
    metrics::gauge!("lb_backend_health", "backend" => addr.to_string()).set(if healthy { 1.0 } else { 0.0 });
}
