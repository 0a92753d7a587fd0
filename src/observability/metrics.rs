//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by outcome and status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_rate_limited_total` (counter): admission rejections
//! - `gateway_upstream_timeouts_total` (counter): deadlines that fired
//! - `gateway_in_flight_requests` (gauge): admitted requests in progress
//! - `gateway_rate_limit_clients` (gauge): counters kept after a sweep
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str, status: u16, route: &str, start: Instant) {
    counter!("gateway_requests_total", "outcome" => outcome, "status" => status.to_string())
        .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_timeout(route: &str) {
    counter!("gateway_upstream_timeouts_total", "route" => route.to_string()).increment(1);
}

pub fn set_in_flight(count: usize) {
    gauge!("gateway_in_flight_requests").set(count as f64);
}

pub fn record_window_reset(tracked_clients: usize) {
    gauge!("gateway_rate_limit_clients").set(tracked_clients as f64);
}
