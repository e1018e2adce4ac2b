//! Balance transactions server.
//!
//! Connects to PostgreSQL (retrying while the database comes up), optionally
//! applies migrations, and serves the balance API until Ctrl+C.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use balance_core::db::Database;
use balance_server::{
    api,
    config::{CliOverrides, ServerConfig},
    logging, metrics,
};
use pico_args::Arguments;
use tracing::{error, info, warn};

const HELP: &str = "\
Run the balance transactions server

USAGE:
  balance_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/balances]

FLAGS:
  --migrate                Apply pending schema migrations before serving
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND                  Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL                 PostgreSQL connection string
  DB_MAX_CONNECTIONS           Pool size upper bound [default: 20]
  DB_MIN_CONNECTIONS           Pool size lower bound [default: 5]
  LOCK_TIMEOUT_MS              Bound on waiting for a balance row lock [default: 5000]
  DB_CONNECT_MAX_RETRIES       Startup connection attempts [default: 30]
  DB_CONNECT_RETRY_DELAY_SECS  Linear backoff step between attempts [default: 1]
  RUN_MIGRATIONS               Same as --migrate
  METRICS_BIND                 Prometheus exporter address (disabled when unset)
  RUST_LOG                     Log filter [default: info,sqlx=warn,hyper=warn]
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let overrides = CliOverrides {
        bind: pargs.opt_value_from_str::<_, SocketAddr>("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        run_migrations: pargs.contains("--migrate"),
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        anyhow::bail!("Unrecognized arguments: {remaining:?}");
    }

    logging::init();

    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;

    if let Some(metrics_bind) = config.metrics_bind {
        match metrics::init_metrics(metrics_bind) {
            Ok(()) => info!("Prometheus exporter listening on {metrics_bind}"),
            Err(e) => warn!("Metrics disabled: {e}"),
        }
    }

    info!("Connecting to database");
    let db = Database::connect_with_retry(&config.database, config.database.retry_policy())
        .await
        .context("Failed to connect to database")?;
    info!("Database connected successfully");

    if config.run_migrations {
        db.migrate().await.context("Failed to run migrations")?;
        info!("Migrations applied");
    }

    let store = Arc::new(db.balance_store(config.database.lock_timeout()));
    let app = api::create_router(api::AppState::new(store));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!("Server is running at http://{}. Press Ctrl+C to stop.", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");
    db.close().await;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
}
