//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use balance_core::db::DatabaseConfig;
use std::net::SocketAddr;

/// Default listen address when neither `--bind` nor `SERVER_BIND` is set
pub const DEFAULT_BIND: SocketAddr = SocketAddr::V4(std::net::SocketAddrV4::new(
    std::net::Ipv4Addr::LOCALHOST,
    8080,
));

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Apply pending schema migrations before serving
    pub run_migrations: bool,
    /// Prometheus exporter address; no exporter when unset
    pub metrics_bind: Option<SocketAddr>,
}

/// Values supplied on the command line. They win over the environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind: Option<SocketAddr>,
    pub database_url: Option<String>,
    pub run_migrations: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if a set variable cannot be parsed where silently falling
    /// back would change where the server listens.
    pub fn from_env(overrides: CliOverrides) -> Result<Self, ConfigError> {
        Self::from_lookup(overrides, |key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(overrides: CliOverrides, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = match overrides.bind {
            Some(bind) => bind,
            None => parse_required_addr(&lookup, "SERVER_BIND")?.unwrap_or(DEFAULT_BIND),
        };

        let defaults = DatabaseConfig::development();
        let database_url = overrides
            .database_url
            .or_else(|| lookup("DATABASE_URL"))
            .unwrap_or(defaults.database_url);

        let database = DatabaseConfig {
            database_url,
            max_connections: parse_var_or(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: parse_var_or(&lookup, "DB_MIN_CONNECTIONS", defaults.min_connections),
            connection_timeout_secs: parse_var_or(
                &lookup,
                "DB_CONNECTION_TIMEOUT_SECS",
                defaults.connection_timeout_secs,
            ),
            idle_timeout_secs: parse_var_or(&lookup, "DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs),
            max_lifetime_secs: parse_var_or(&lookup, "DB_MAX_LIFETIME_SECS", defaults.max_lifetime_secs),
            lock_timeout_ms: parse_var_or(&lookup, "LOCK_TIMEOUT_MS", defaults.lock_timeout_ms),
            connect_max_retries: parse_var_or(&lookup, "DB_CONNECT_MAX_RETRIES", defaults.connect_max_retries),
            connect_retry_delay_secs: parse_var_or(
                &lookup,
                "DB_CONNECT_RETRY_DELAY_SECS",
                defaults.connect_retry_delay_secs,
            ),
        };

        let run_migrations = overrides.run_migrations || parse_var_or(&lookup, "RUN_MIGRATIONS", false);
        let metrics_bind = parse_required_addr(&lookup, "METRICS_BIND")?;

        Ok(ServerConfig {
            bind,
            database,
            run_migrations,
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let db = &self.database;

        if db.max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if db.min_connections > db.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!("Cannot exceed max connections ({})", db.max_connections),
            });
        }

        if db.lock_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "LOCK_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if db.connect_max_retries == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_CONNECT_MAX_RETRIES".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if db.database_url.is_empty() {
            return Err(ConfigError::MissingRequired {
                var: "DATABASE_URL".to_string(),
                hint: "Example: postgres://postgres@localhost/balances".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse a variable with default fallback
fn parse_var_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_required_addr<F>(lookup: &F, key: &str) -> Result<Option<SocketAddr>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("Not a socket address: {raw:?}"),
        }),
    }
}
