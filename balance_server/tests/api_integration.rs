//! Integration tests for the HTTP API over the in-memory store.
//!
//! Exercises status codes, error bodies, validation precedence and
//! idempotency through the full router, middleware included.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use balance_core::db::{BalanceStore, MemoryUnitOfWork, StoreResult};
use balance_core::ledger::{TransactionRecord, User, UserId};
use balance_core::{Amount, MemoryBalanceStore, StoreError};
use balance_server::api::errors::ErrorResponse;
use balance_server::api::request_id::REQUEST_ID_HEADER;
use balance_server::api::users::{BalanceResponse, TransactionResponse};
use balance_server::api::{AppState, create_router};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // For `oneshot` method

/// Helper to create a test server over a store with users 1, 2 and 3
async fn create_test_server() -> (Router, Arc<MemoryBalanceStore>) {
    let store = Arc::new(MemoryBalanceStore::default());
    for (user_id, balance) in [(1, "100.00"), (2, "50.00"), (3, "0.00")] {
        store.insert_user(user_id, Amount::parse_balance(balance).unwrap()).await;
    }
    let app = create_router(AppState::new(Arc::clone(&store)));
    (app, store)
}

fn balance_request(user_id: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/user/{user_id}/balance"))
        .body(Body::empty())
        .unwrap()
}

fn transaction_request(user_id: &str, source_type: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/user/{user_id}/transaction"))
        .header("content-type", "application/json");
    if let Some(source_type) = source_type {
        builder = builder.header("Source-Type", source_type);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_else(|e| panic!("unexpected body {:?}: {e}", String::from_utf8_lossy(body)))
}

async fn expect_error(app: &Router, request: Request<Body>, status: StatusCode, code: &str, message: &str) {
    let (actual_status, body) = send(app, request).await;
    assert_eq!(actual_status, status, "body: {}", String::from_utf8_lossy(&body));
    let error: ErrorResponse = parse(&body);
    assert_eq!(error.error, code);
    assert_eq!(error.message, message);
}

async fn get_balance(app: &Router, user_id: u64) -> String {
    let (status, body) = send(app, balance_request(&user_id.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    let response: BalanceResponse = parse(&body);
    response.balance.to_string()
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let (app, _) = create_test_server().await;

    let (status, body) = send(&app, Request::builder().uri("/health").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = parse(&body);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["database"], true);
}

#[tokio::test]
async fn test_health_check_reports_unreachable_store() {
    let app = create_router(AppState::new(Arc::new(UnreachableStore::default())));

    let (status, body) = send(&app, Request::builder().uri("/health").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: serde_json::Value = parse(&body);
    assert_eq!(health["status"], "unhealthy");
}

// ============================================================================
// Balance Tests
// ============================================================================

#[tokio::test]
async fn test_get_balance() {
    let (app, _) = create_test_server().await;

    let (status, body) = send(&app, balance_request("1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), r#"{"userId":1,"balance":"100.00"}"#);
}

#[tokio::test]
async fn test_get_balance_zero() {
    let (app, _) = create_test_server().await;
    assert_eq!(get_balance(&app, 3).await, "0.00");
}

#[tokio::test]
async fn test_get_balance_invalid_user_id() {
    let (app, _) = create_test_server().await;

    for raw in ["abc", "-1", "1.5"] {
        expect_error(
            &app,
            balance_request(raw),
            StatusCode::BAD_REQUEST,
            "invalid_user_id",
            "User ID must be a positive integer",
        )
        .await;
    }
}

#[tokio::test]
async fn test_get_balance_unknown_user() {
    let (app, _) = create_test_server().await;

    expect_error(&app, balance_request("999"), StatusCode::NOT_FOUND, "user_not_found", "User does not exist").await;
}

#[tokio::test]
async fn test_get_balance_corrupt_row_is_generic_500() {
    let (app, store) = create_test_server().await;
    store.corrupt_balance(2, "garbage").await;

    expect_error(
        &app,
        balance_request("2"),
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "Failed to get balance",
    )
    .await;
}

// ============================================================================
// Transaction Tests
// ============================================================================

#[tokio::test]
async fn test_win_transaction() {
    let (app, store) = create_test_server().await;

    let (status, body) = send(
        &app,
        transaction_request("1", Some("game"), r#"{"state": "win", "amount": "50.00", "transactionId": "tx-1"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let response: TransactionResponse = parse(&body);
    assert!(response.success);
    assert_eq!(response.message, "Transaction processed successfully");
    assert_eq!(get_balance(&app, 1).await, "150.00");
    assert_eq!(store.transaction_count().await, 1);
}

#[tokio::test]
async fn test_lose_transaction_with_short_amount() {
    let (app, _) = create_test_server().await;

    let (status, _) = send(
        &app,
        transaction_request("2", Some("payment"), r#"{"state": "lose", "amount": "5.5", "transactionId": "tx-2"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(get_balance(&app, 2).await, "44.50");
}

#[tokio::test]
async fn test_insufficient_balance() {
    let (app, store) = create_test_server().await;

    expect_error(
        &app,
        transaction_request("2", Some("server"), r#"{"state": "lose", "amount": "50.01", "transactionId": "tx-3"}"#),
        StatusCode::BAD_REQUEST,
        "insufficient_balance",
        "Account balance cannot be negative",
    )
    .await;

    assert_eq!(get_balance(&app, 2).await, "50.00");
    assert_eq!(store.transaction_count().await, 0);
}

#[tokio::test]
async fn test_duplicate_transaction() {
    let (app, store) = create_test_server().await;
    let body = r#"{"state": "win", "amount": "10.00", "transactionId": "dup-1"}"#;

    let (status, _) = send(&app, transaction_request("1", Some("game"), body)).await;
    assert_eq!(status, StatusCode::OK);

    expect_error(
        &app,
        transaction_request("1", Some("game"), body),
        StatusCode::CONFLICT,
        "duplicate_transaction",
        "Transaction with this ID has already been processed",
    )
    .await;

    // The id is global: another user cannot reuse it either.
    expect_error(
        &app,
        transaction_request("2", Some("game"), body),
        StatusCode::CONFLICT,
        "duplicate_transaction",
        "Transaction with this ID has already been processed",
    )
    .await;

    assert_eq!(get_balance(&app, 1).await, "110.00");
    assert_eq!(get_balance(&app, 2).await, "50.00");
    assert_eq!(store.transaction_count().await, 1);
}

#[tokio::test]
async fn test_transaction_unknown_user() {
    let (app, _) = create_test_server().await;

    expect_error(
        &app,
        transaction_request("999", Some("game"), r#"{"state": "win", "amount": "1.00", "transactionId": "tx-4"}"#),
        StatusCode::NOT_FOUND,
        "user_not_found",
        "User does not exist",
    )
    .await;
}

#[tokio::test]
async fn test_validation_errors() {
    let (app, store) = create_test_server().await;
    let valid = r#"{"state": "win", "amount": "10.50", "transactionId": "tx-5"}"#;

    let cases = [
        ("abc", Some("game"), valid, "invalid_user_id", "User ID must be a positive integer"),
        ("1", None, valid, "missing_header", "Source-Type header is required"),
        ("1", Some("casino"), valid, "invalid_source_type", "Source-Type must be one of: game, server, payment"),
        ("1", Some("game"), "{not json", "invalid_request_body", "Invalid JSON format"),
        ("1", Some("game"), r#"["win", "5.00", "tx-arr"]"#, "invalid_request_body", "Invalid JSON format"),
        ("1", Some("game"), "[]", "invalid_request_body", "Invalid JSON format"),
        ("1", Some("game"), r#"{"amount": "1.00", "transactionId": "x"}"#, "missing_state", "State field is required"),
        ("1", Some("game"), r#"{"state": "draw", "amount": "1.00", "transactionId": "x"}"#, "invalid_state", "State must be 'win' or 'lose'"),
        ("1", Some("game"), r#"{"state": "win", "amount": "1.00"}"#, "missing_transaction_id", "TransactionId field is required"),
        ("1", Some("game"), r#"{"state": "win", "amount": "", "transactionId": "x"}"#, "invalid_amount", "amount is required"),
        ("1", Some("game"), r#"{"state": "win", "amount": "abc", "transactionId": "x"}"#, "invalid_amount", "invalid amount format"),
        ("1", Some("game"), r#"{"state": "win", "amount": "0.00", "transactionId": "x"}"#, "invalid_amount", "amount must be positive"),
        ("1", Some("game"), r#"{"state": "win", "amount": "10.123", "transactionId": "x"}"#, "invalid_amount", "amount can have at most 2 decimal places"),
        ("1", Some("game"), r#"{"state": "win", "amount": "0.00000000000000000000000000001", "transactionId": "x"}"#, "invalid_amount", "amount can have at most 2 decimal places"),
        ("1", Some("game"), r#"{"state": "win", "amount": "1000000000000000000.00", "transactionId": "x"}"#, "invalid_amount", "amount exceeds the maximum supported value"),
    ];

    for (user_id, source_type, body, code, message) in cases {
        expect_error(&app, transaction_request(user_id, source_type, body), StatusCode::BAD_REQUEST, code, message).await;
    }

    assert_eq!(store.transaction_count().await, 0);
    assert_eq!(get_balance(&app, 1).await, "100.00");
}

#[tokio::test]
async fn test_source_type_header_is_case_insensitive_name_but_exact_value() {
    let (app, _) = create_test_server().await;

    let request = Request::builder()
        .method("POST")
        .uri("/user/1/transaction")
        .header("SOURCE-TYPE", "game")
        .body(Body::from(r#"{"state": "win", "amount": "1.00", "transactionId": "hdr-1"}"#))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    expect_error(
        &app,
        transaction_request("1", Some("GAME"), r#"{"state": "win", "amount": "1.00", "transactionId": "hdr-2"}"#),
        StatusCode::BAD_REQUEST,
        "invalid_source_type",
        "Source-Type must be one of: game, server, payment",
    )
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_serialize() {
    let (app, _) = create_test_server().await;

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                let body = format!(r#"{{"state": "win", "amount": "0.50", "transactionId": "burst-{i}"}}"#);
                send(&app, transaction_request("3", Some("game"), &body)).await.0
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    assert_eq!(get_balance(&app, 3).await, "10.00");
}

// ============================================================================
// Middleware Tests
// ============================================================================

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _) = create_test_server().await;

    let request = Request::builder()
        .uri("/user/1/balance")
        .header(REQUEST_ID_HEADER, "trace-abc")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "trace-abc");
}

#[tokio::test]
async fn test_request_id_is_generated() {
    let (app, _) = create_test_server().await;

    let response = app.clone().oneshot(balance_request("1")).await.unwrap();

    let generated = response.headers().get(REQUEST_ID_HEADER).unwrap().to_str().unwrap();
    assert!(uuid_like(generated), "generated id {generated}");
}

fn uuid_like(value: &str) -> bool {
    value.len() == 36 && value.chars().filter(|c| *c == '-').count() == 4
}

/// A store whose database never answers.
#[derive(Default)]
struct UnreachableStore {
    inner: MemoryBalanceStore,
}

#[async_trait]
impl BalanceStore for UnreachableStore {
    type Unit = MemoryUnitOfWork;

    async fn lookup(&self, user_id: UserId) -> StoreResult<Option<User>> {
        self.inner.lookup(user_id).await
    }

    async fn begin(&self) -> StoreResult<MemoryUnitOfWork> {
        self.inner.begin().await
    }

    async fn transactions_for_user(&self, user_id: UserId) -> StoreResult<Vec<TransactionRecord>> {
        self.inner.transactions_for_user(user_id).await
    }

    async fn ping(&self) -> StoreResult<()> {
        Err(StoreError::Timeout(Duration::from_secs(5)))
    }
}
