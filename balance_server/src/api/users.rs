//! User balance API handlers.
//!
//! Handlers take the raw path segment, headers and body so that validation
//! order is decided by [`balance_core::validation`] alone.
//!
//! # Examples
//!
//! Get a balance:
//! ```bash
//! curl http://localhost:8080/user/1/balance
//! ```
//!
//! Apply a transaction:
//! ```bash
//! curl -X POST http://localhost:8080/user/1/transaction \
//!   -H "Source-Type: game" \
//!   -H "Content-Type: application/json" \
//!   -d '{"state": "win", "amount": "10.15", "transactionId": "tx-1"}'
//! ```

use std::time::Instant;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use balance_core::{Amount, BalanceStore, validation};
use serde::{Deserialize, Serialize};

use super::AppState;
use super::errors::{ApiError, Operation};
use crate::metrics;

/// Header naming the kind of caller issuing a transaction
pub const SOURCE_TYPE_HEADER: &str = "source-type";

/// Message returned with every applied transaction
pub const TRANSACTION_SUCCESS_MESSAGE: &str = "Transaction processed successfully";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user_id: u64,
    pub balance: Amount,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionResponse {
    pub success: bool,
    pub message: String,
}

/// Get the current balance of a user.
///
/// # Response
///
/// ```json
/// {"userId": 1, "balance": "100.00"}
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: User id is not an unsigned integer
/// - `404 Not Found`: No such user
/// - `500 Internal Server Error`: Storage failure or unreadable balance
pub async fn get_balance<S: BalanceStore>(
    State(state): State<AppState<S>>,
    Path(raw_user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id = validation::parse_user_id(&raw_user_id).map_err(|e| {
        tracing::warn!(raw_user_id = %raw_user_id, "Invalid user ID");
        metrics::balance_queries_total(e.code());
        ApiError::validation(&e)
    })?;

    match state.query.get_balance(user_id).await {
        Ok(view) => {
            metrics::balance_queries_total("success");
            Ok(Json(BalanceResponse {
                user_id: view.user_id,
                balance: view.balance,
            }))
        }
        Err(e) => {
            let api_error = ApiError::ledger(&e, Operation::GetBalance);
            if e.is_internal() {
                tracing::error!(user_id, error = %e, "Failed to get balance");
            }
            metrics::balance_queries_total(api_error.code);
            Err(api_error)
        }
    }
}

/// Apply a `win` or `lose` transaction to a user's balance.
///
/// # Request
///
/// Header `Source-Type: game | server | payment` and body:
///
/// ```json
/// {"state": "win", "amount": "10.15", "transactionId": "tx-1"}
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Validation failure or insufficient balance
/// - `404 Not Found`: No such user
/// - `409 Conflict`: Transaction id already processed
/// - `503 Service Unavailable`: Balance lock not acquired in time, retry
/// - `500 Internal Server Error`: Storage failure
pub async fn process_transaction<S: BalanceStore>(
    State(state): State<AppState<S>>,
    Path(raw_user_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TransactionResponse>, ApiError> {
    // Non-ASCII values can never name a source type.
    let source_type = headers.get(SOURCE_TYPE_HEADER).map(|v| v.to_str().unwrap_or("<non-ascii>"));

    let validated = validation::validate_transaction(&raw_user_id, source_type, &body).map_err(|e| {
        tracing::warn!(raw_user_id = %raw_user_id, code = e.code(), reason = %e, "Transaction request rejected");
        metrics::transactions_total(e.code());
        ApiError::validation(&e)
    })?;

    tracing::info!(
        user_id = validated.user_id,
        state = %validated.request.state,
        amount = %validated.request.amount,
        transaction_id = %validated.request.transaction_id,
        source_type = %validated.source_type,
        "Processing transaction"
    );

    let start = Instant::now();
    let result = state
        .engine
        .process(validated.user_id, &validated.request, validated.source_type)
        .await;
    metrics::transaction_duration_ms(start.elapsed().as_secs_f64() * 1000.0);

    match result {
        Ok(receipt) => {
            tracing::info!(
                user_id = receipt.user_id,
                record_id = receipt.record_id,
                transaction_id = %receipt.transaction_id,
                previous_balance = %receipt.previous_balance,
                new_balance = %receipt.new_balance,
                "Transaction processed successfully"
            );
            metrics::transactions_total("success");
            Ok(Json(TransactionResponse {
                success: true,
                message: TRANSACTION_SUCCESS_MESSAGE.to_string(),
            }))
        }
        Err(e) => {
            let api_error = ApiError::ledger(&e, Operation::ProcessTransaction);
            if e.is_internal() {
                tracing::error!(user_id = validated.user_id, error = %e, "Failed to process transaction");
            } else {
                tracing::warn!(user_id = validated.user_id, code = api_error.code, "Transaction refused");
            }
            metrics::transactions_total(api_error.code);
            Err(api_error)
        }
    }
}
