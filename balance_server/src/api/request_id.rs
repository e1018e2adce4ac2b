//! Request ID middleware for tracing and log correlation.
//!
//! Every request runs inside a span carrying its id, so log lines emitted by
//! handlers (and by `balance_core` through the `log` bridge) can be joined
//! back to the request that caused them.

use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::{logging, metrics};

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Upper bound on a propagated id; longer values are replaced.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Generate or extract request ID from headers
fn get_or_generate_request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= MAX_REQUEST_ID_LEN)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Route template used as the metrics `path` label, so user ids do not
/// become label values.
fn route_label(path: &str) -> &'static str {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["health"] => "/health",
        ["user", _, "balance"] => "/user/{user_id}/balance",
        ["user", _, "transaction"] => "/user/{user_id}/transaction",
        _ => "other",
    }
}

/// Middleware to add request ID to all requests and responses
///
/// 1. Extracts existing request ID from header or generates a new one
/// 2. Runs the request inside a span tagged with the ID
/// 3. Adds request ID to response headers
/// 4. Records request count and latency
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware};
/// use balance_server::api::request_id::request_id_middleware;
///
/// let app: Router = Router::new()
///     .route("/", get(|| async { "Hello" }))
///     .layer(middleware::from_fn(request_id_middleware));
/// ```
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = get_or_generate_request_id(request.headers());
    let method = request.method().clone();
    let path = route_label(request.uri().path());

    let span = tracing::info_span!("request", request_id = %request_id, method = %method, path = path);
    let start = Instant::now();

    let mut response = async {
        tracing::debug!(uri = %request.uri(), "Request started");
        next.run(request).await
    }
    .instrument(span)
    .await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    let elapsed = start.elapsed();
    let status = response.status().as_u16();
    let duration_ms = elapsed.as_millis() as u64;

    logging::log_api_request(method.as_str(), path, status, duration_ms, &request_id);
    logging::log_performance(path, duration_ms);
    metrics::http_requests_total(method.as_str(), path, status);
    metrics::http_request_duration_ms(method.as_str(), path, elapsed.as_secs_f64() * 1000.0);

    response
}
