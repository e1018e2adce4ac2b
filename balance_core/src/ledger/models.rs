//! Ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::Amount;

/// Externally supplied user identifier.
pub type UserId = u64;

/// A user row as held by the store.
///
/// The balance is kept as the stored decimal string; the engine parses it
/// through [`Amount::parse_balance`] so that corrupt rows surface as errors
/// instead of being silently coerced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub balance: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Direction of a balance adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    /// Credit
    Win,
    /// Debit
    Lose,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Win => "win",
            TransactionState::Lose => "lose",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "win" => Some(TransactionState::Win),
            "lose" => Some(TransactionState::Lose),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of the caller issuing a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Game,
    Server,
    Payment,
}

impl SourceType {
    pub const ALL: [SourceType; 3] = [SourceType::Game, SourceType::Server, SourceType::Payment];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Game => "game",
            SourceType::Server => "server",
            SourceType::Payment => "payment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|source| source.as_str() == value)
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated request to adjust one user's balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub state: TransactionState,
    pub amount: Amount,
    /// Caller-supplied idempotency key, unique across all users
    pub transaction_id: String,
}

/// A transaction log entry about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub transaction_id: String,
    pub amount: Amount,
    pub state: TransactionState,
    pub source_type: SourceType,
}

/// A committed transaction log entry. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub user_id: UserId,
    pub transaction_id: String,
    pub amount: Amount,
    pub state: TransactionState,
    pub source_type: SourceType,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a committed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Sequence id of the appended record
    pub record_id: i64,
    pub user_id: UserId,
    pub transaction_id: String,
    pub previous_balance: Amount,
    pub new_balance: Amount,
}

/// Current balance of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    pub user_id: UserId,
    pub balance: Amount,
}
