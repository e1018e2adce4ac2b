//! Ledger module: applies balance adjustments exactly once and answers
//! balance queries.
//!
//! This module implements:
//! - One atomic unit of work per transaction (duplicate check, row lock,
//!   arithmetic, balance write, log append)
//! - Global idempotency keyed on the caller's transaction id
//! - Non-negative balances in exact two-digit decimals
//!
//! ## Example
//!
//! ```
//! use balance_core::db::MemoryBalanceStore;
//! use balance_core::ledger::{BalanceQuery, SourceType, TransactionEngine, TransactionRequest, TransactionState};
//! use balance_core::Amount;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryBalanceStore::default());
//!     store.insert_user(1, Amount::parse_balance("100.00")?).await;
//!
//!     let engine = TransactionEngine::new(Arc::clone(&store));
//!     let request = TransactionRequest {
//!         state: TransactionState::Win,
//!         amount: Amount::parse_transaction("50.00")?,
//!         transaction_id: "tx-1".to_string(),
//!     };
//!     engine.process(1, &request, SourceType::Game).await?;
//!
//!     let view = BalanceQuery::new(store).get_balance(1).await?;
//!     assert_eq!(view.balance.to_string(), "150.00");
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod errors;
pub mod models;
pub mod query;

pub use engine::{TransactionEngine, calculate_new_balance};
pub use errors::{LedgerError, LedgerResult};
pub use models::{
    BalanceView, NewTransaction, SourceType, TransactionReceipt, TransactionRecord, TransactionRequest,
    TransactionState, User, UserId,
};
pub use query::BalanceQuery;
