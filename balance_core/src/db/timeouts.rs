//! Bounded waits for store operations.
//!
//! Nothing in the store is allowed to block forever: row locks and plain
//! queries both run under a deadline.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use super::errors::{StoreError, StoreResult};

/// Default bound on waiting for a user's row lock (5 seconds)
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for single queries such as health checks (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for a row lock, failing with [`StoreError::LockTimeout`] after `duration`.
pub async fn with_lock_timeout<F, T>(duration: Duration, future: F) -> StoreResult<T>
where
    F: Future<Output = T>,
{
    timeout(duration, future)
        .await
        .map_err(|_| StoreError::LockTimeout(duration))
}

/// Execute a query with timeout
///
/// # Example
///
/// ```no_run
/// use balance_core::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// # use sqlx::PgPool;
/// # async fn example(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// with_timeout(DEFAULT_QUERY_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> StoreResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(duration, future).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(StoreError::Timeout(duration)),
    }
}

/// `SET LOCAL` statement bounding PostgreSQL lock waits for one transaction.
///
/// Truncated to whole milliseconds; PostgreSQL treats `0` as "wait forever",
/// so the result is never zero.
pub fn lock_timeout_statement(duration: Duration) -> String {
    let millis = duration.as_millis().max(1);
    format!("SET LOCAL lock_timeout = '{millis}ms'")
}
