//! Database configuration module.
//!
//! Provides configuration structures for pool sizing, lock waits and the
//! startup connection retry policy.

use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,

    /// Maximum connection lifetime in seconds
    pub max_lifetime_secs: u64,

    /// Bound on waiting for a user's row lock, in milliseconds
    pub lock_timeout_ms: u64,

    /// Startup connection attempts before giving up
    pub connect_max_retries: u32,

    /// Base delay between startup connection attempts, in seconds
    pub connect_retry_delay_secs: u64,
}

impl DatabaseConfig {
    /// Create a default configuration for development
    ///
    /// Uses `postgres://postgres@localhost/balances` as the database URL
    pub fn development() -> Self {
        Self {
            database_url: "postgres://postgres@localhost/balances".to_string(),
            max_connections: 20,
            min_connections: 5,
            connection_timeout_secs: 10,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
            lock_timeout_ms: 5000,
            connect_max_retries: 30,
            connect_retry_delay_secs: 1,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.connect_max_retries,
            base_delay: Duration::from_secs(self.connect_retry_delay_secs),
            max_delay: RetryPolicy::MAX_DELAY,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::development()
    }
}

/// Linear backoff used while waiting for the database to come up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const MAX_DELAY: Duration = Duration::from_secs(30);

    /// Delay after the failed `attempt` (1-based): `attempt * base_delay`,
    /// capped at `max_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(attempt)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}
