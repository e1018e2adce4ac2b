//! Ledger error types.

use std::time::Duration;

use thiserror::Error;

use super::models::UserId;
use crate::amount::{Amount, AmountError};
use crate::db::StoreError;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Transaction id was already recorded
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// A debit would take the balance below zero
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Amount, required: Amount },

    /// Waiting for the user's row lock exceeded the configured bound
    #[error("Timed out after {0:?} waiting for balance lock")]
    LockTimeout(Duration),

    /// Stored balance is not a valid non-negative two-digit amount
    #[error("Corrupt balance for user {user_id}: {source}")]
    CorruptBalance {
        user_id: UserId,
        #[source]
        source: AmountError,
    },

    /// Amount reached the engine without passing validation
    #[error("Invalid transaction amount: {0}")]
    InvalidAmount(#[source] AmountError),

    #[error("Balance overflow")]
    BalanceOverflow,

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockTimeout(waited) => LedgerError::LockTimeout(waited),
            StoreError::DuplicateTransactionId(id) => LedgerError::DuplicateTransaction(id),
            other => LedgerError::Store(other),
        }
    }
}

impl LedgerError {
    /// True for failures the caller did not cause and cannot fix.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            LedgerError::CorruptBalance { .. }
                | LedgerError::InvalidAmount(_)
                | LedgerError::BalanceOverflow
                | LedgerError::Store(_)
        )
    }

    /// Get a client-safe error message that doesn't leak internal state
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::DuplicateTransaction(_) => {
                "Transaction with this ID has already been processed".to_string()
            }
            LedgerError::UserNotFound(_) => "User does not exist".to_string(),
            LedgerError::InsufficientBalance { .. } => "Account balance cannot be negative".to_string(),
            LedgerError::LockTimeout(_) => "Balance is busy, retry the request".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
