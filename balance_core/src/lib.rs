//! # Balance Core
//!
//! Per-user monetary balances with idempotent, all-or-nothing adjustments.
//!
//! A transaction credits (`win`) or debits (`lose`) one user's balance and
//! is recorded under a caller-supplied transaction id. Each id is applied at
//! most once across the whole system, balances never go negative, and
//! concurrent requests for the same user serialize on that user's row lock.
//!
//! ## Core Modules
//!
//! - [`amount`]: Two-decimal monetary parsing and formatting
//! - [`db`]: Balance store traits, PostgreSQL and in-memory implementations
//! - [`ledger`]: Transaction engine and balance query
//! - [`validation`]: Ordered validation of raw request fields
//!
//! ## Example
//!
//! ```
//! use balance_core::validation::validate_transaction;
//!
//! let body = br#"{"state": "lose", "amount": "12.50", "transactionId": "round-7"}"#;
//! let validated = validate_transaction("42", Some("game"), body).unwrap();
//! assert_eq!(validated.user_id, 42);
//! assert_eq!(validated.request.amount.to_string(), "12.50");
//! ```

pub mod amount;
pub mod db;
pub mod ledger;
pub mod validation;

pub use amount::{Amount, AmountError, format_amount};
pub use db::{BalanceStore, MemoryBalanceStore, PgBalanceStore, StoreError, UnitOfWork};
pub use ledger::{
    BalanceQuery, BalanceView, LedgerError, LedgerResult, SourceType, TransactionEngine, TransactionReceipt,
    TransactionRequest, TransactionState, UserId,
};
pub use validation::{ValidatedTransaction, ValidationError, validate_transaction};
