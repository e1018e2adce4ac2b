//! Mapping of validation and ledger failures onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use balance_core::{LedgerError, ValidationError};
use serde::{Deserialize, Serialize};

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Which endpoint failed; decides the generic text for internal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetBalance,
    ProcessTransaction,
}

impl Operation {
    fn internal_message(self) -> &'static str {
        match self {
            Operation::GetBalance => "Failed to get balance",
            Operation::ProcessTransaction => "Failed to process transaction",
        }
    }
}

/// A failure ready to be sent to the client.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn validation(err: &ValidationError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: err.code(),
            message: err.to_string(),
        }
    }

    pub fn ledger(err: &LedgerError, operation: Operation) -> Self {
        let (status, code) = match err {
            LedgerError::UserNotFound(_) => (StatusCode::NOT_FOUND, "user_not_found"),
            LedgerError::DuplicateTransaction(_) => (StatusCode::CONFLICT, "duplicate_transaction"),
            LedgerError::InsufficientBalance { .. } => (StatusCode::BAD_REQUEST, "insufficient_balance"),
            LedgerError::LockTimeout(_) => (StatusCode::SERVICE_UNAVAILABLE, "lock_timeout"),
            LedgerError::CorruptBalance { .. }
            | LedgerError::InvalidAmount(_)
            | LedgerError::BalanceOverflow
            | LedgerError::Store(_) => {
                return Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal_error",
                    message: operation.internal_message().to_string(),
                };
            }
        };

        Self {
            status,
            code,
            message: err.client_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.code.to_string(),
                message: self.message,
            }),
        )
            .into_response()
    }
}
