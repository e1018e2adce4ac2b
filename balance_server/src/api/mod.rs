//! HTTP API for the balance service.
//!
//! # Modules
//!
//! - [`users`]: Balance lookup and transaction processing
//! - [`errors`]: Error body and status mapping
//! - [`request_id`]: Request correlation middleware
//!
//! # Endpoints Overview
//!
//! ```text
//! GET  /user/{userId}/balance          - Current balance
//! POST /user/{userId}/transaction      - Apply a win/lose transaction
//! GET  /health                         - Store connectivity
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use balance_server::api::{create_router, AppState};
//! use balance_core::MemoryBalanceStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let state = AppState::new(Arc::new(MemoryBalanceStore::default()));
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively. In production, configure appropriate
//! origins, methods, and headers.

pub mod errors;
pub mod request_id;
pub mod users;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use balance_core::{BalanceQuery, BalanceStore, TransactionEngine};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every field is behind an `Arc`.
pub struct AppState<S: BalanceStore> {
    pub engine: TransactionEngine<S>,
    pub query: BalanceQuery<S>,
    pub store: Arc<S>,
}

impl<S: BalanceStore> AppState<S> {
    /// Build the engine and query service over one shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            engine: TransactionEngine::new(Arc::clone(&store)),
            query: BalanceQuery::new(Arc::clone(&store)),
            store,
        }
    }
}

impl<S: BalanceStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            query: self.query.clone(),
            store: Arc::clone(&self.store),
        }
    }
}

/// Create the API router with all endpoints and middleware.
pub fn create_router<S: BalanceStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health_check::<S>))
        .route("/user/{user_id}/balance", get(users::get_balance::<S>))
        .route("/user/{user_id}/transaction", post(users::process_transaction::<S>))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if the store answers, or `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","version":"1.0.0","database":true,"timestamp":"2026-01-01T10:30:00Z"}
/// ```
async fn health_check<S: BalanceStore>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let db_healthy = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            false
        }
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
