//! Metrics collection and exposition.
//!
//! # Metrics
//! - `s3web_requests_total` (counter): served requests by site, status
//! - `s3web_request_duration_seconds` (histogram): latency by site
//! - `s3web_resolutions_total` (counter): path resolutions by site, outcome
//! - `s3web_candidate_failures_total` (counter): store errors while probing a candidate
//!
//! Without an installed recorder every call is a no-op, which is what tests
//! and `metrics_enabled = false` get.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must run inside the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(site: &str, status: u16, start: Instant) {
    counter!(
        "s3web_requests_total",
        "site" => site.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("s3web_request_duration_seconds", "site" => site.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_resolution(site: &str, outcome: &'static str) {
    counter!(
        "s3web_resolutions_total",
        "site" => site.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_candidate_failure(site: &str) {
    counter!("s3web_candidate_failures_total", "site" => site.to_string()).increment(1);
}
