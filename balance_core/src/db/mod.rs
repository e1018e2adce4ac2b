//! Database module providing PostgreSQL connection pooling and the balance
//! store abstraction.
//!
//! [`BalanceStore`] and [`UnitOfWork`] are the seams the ledger is written
//! against. [`PgBalanceStore`] backs them with PostgreSQL row locks,
//! [`MemoryBalanceStore`] with per-user async mutexes.

use log::{info, warn};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod errors;
pub mod memory;
pub mod repository;
pub mod timeouts;

pub use config::{DatabaseConfig, RetryPolicy};
pub use errors::{StoreError, StoreResult};
pub use memory::{MemoryBalanceStore, MemoryUnitOfWork};
pub use repository::{BalanceStore, PgBalanceStore, PgUnitOfWork, UnitOfWork};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use balance_core::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let db = Database::new(&DatabaseConfig::development()).await?;
    ///     db.close().await;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Connect, retrying with linear backoff while the database is unreachable.
    ///
    /// Returns the last connection error once `policy.max_attempts` attempts
    /// have failed.
    pub async fn connect_with_retry(config: &DatabaseConfig, policy: RetryPolicy) -> Result<Self, sqlx::Error> {
        let mut attempt = 1;
        loop {
            match Self::new(config).await {
                Ok(db) => {
                    info!("Database connected after {attempt} attempt(s)");
                    return Ok(db);
                }
                Err(e) if attempt < policy.max_attempts => {
                    let delay = policy.delay_after(attempt);
                    warn!(
                        "Failed to connect to database (attempt {attempt}/{}): {e}. Retrying in {delay:?}",
                        policy.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the schema migrations bundled with this crate.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Build a [`PgBalanceStore`] over this pool.
    pub fn balance_store(&self, lock_timeout: Duration) -> PgBalanceStore {
        PgBalanceStore::new(self.pool.clone(), lock_timeout)
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}
