//! Store error types.

use std::time::Duration;

use thiserror::Error;

use crate::ledger::UserId;

/// Errors raised by a [`BalanceStore`](super::BalanceStore) or its units of work
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Row lock could not be acquired in time
    #[error("Row lock not acquired within {0:?}")]
    LockTimeout(Duration),

    /// Operation did not finish in time
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    /// Unique key on the transaction log was hit
    #[error("Transaction id already recorded: {0}")]
    DuplicateTransactionId(String),

    /// Balance write attempted without holding the row lock
    #[error("Balance update for user {0} without a row lock")]
    NotLocked(UserId),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
