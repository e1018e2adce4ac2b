//! Structured logging configuration.
//!
//! `balance_core` logs through the `log` facade; the subscriber installed
//! here picks those records up alongside the server's own `tracing` events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use balance_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // `try_init` also bridges `log` records; it fails only if a subscriber is already set.
    if tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init().is_err() {
        tracing::debug!("Global subscriber already installed");
        return;
    }

    tracing::info!("Structured logging initialized");
}

/// Log API request/response
///
/// # Arguments
///
/// * `method` - HTTP method
/// * `path` - Request path
/// * `status_code` - Response status code
/// * `duration_ms` - Request duration in milliseconds
/// * `request_id` - Correlation id of the request
pub fn log_api_request(method: &str, path: &str, status_code: u16, duration_ms: u64, request_id: &str) {
    if status_code >= 500 {
        tracing::error!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            request_id = request_id,
            "API request failed"
        );
    } else {
        tracing::info!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            request_id = request_id,
            "API request completed"
        );
    }
}

/// Log a request that took longer than expected
pub fn log_performance(operation: &str, duration_ms: u64) {
    if duration_ms > 1000 {
        tracing::warn!(operation = operation, duration_ms = duration_ms, "PERFORMANCE: Slow operation");
    } else {
        tracing::debug!(operation = operation, duration_ms = duration_ms, "Performance metric");
    }
}
