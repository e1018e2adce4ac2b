//! Prometheus metrics for the balance service.
//!
//! Metrics are exposed in Prometheus text format for scraping by monitoring
//! systems. Without an installed exporter every call here is a no-op.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use balance_server::metrics;
//! use std::net::SocketAddr;
//!
//! // Initialize metrics exporter
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! // Record a processed transaction
//! metrics::transactions_total("success");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Ledger Metrics
// ============================================================================

/// Count a transaction request by outcome (the error code, or `success`).
pub fn transactions_total(outcome: &'static str) {
    metrics::counter!("transactions_total", "outcome" => outcome).increment(1);
}

/// Record how long the engine took to settle a transaction.
pub fn transaction_duration_ms(duration_ms: f64) {
    metrics::histogram!("transaction_duration_ms").record(duration_ms);
}

/// Count a balance query by outcome (the error code, or `success`).
pub fn balance_queries_total(outcome: &'static str) {
    metrics::counter!("balance_queries_total", "outcome" => outcome).increment(1);
}
