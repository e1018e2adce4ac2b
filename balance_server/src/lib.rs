//! HTTP front end for the balance ledger.
//!
//! Exposes balance lookup and transaction processing over axum, with
//! environment-driven configuration, structured logging and Prometheus
//! metrics.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
