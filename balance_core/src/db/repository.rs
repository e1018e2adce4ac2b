//! Store traits for balances and the transaction log, plus the PostgreSQL
//! implementation.
//!
//! Every mutation happens inside a [`UnitOfWork`]. Dropping a unit of work
//! without calling [`UnitOfWork::commit`] rolls it back.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use super::errors::{StoreError, StoreResult};
use super::timeouts::{DEFAULT_QUERY_TIMEOUT, lock_timeout_statement, with_timeout};
use crate::amount::Amount;
use crate::ledger::{NewTransaction, SourceType, TransactionRecord, TransactionState, User, UserId};

/// PostgreSQL error raised when `lock_timeout` expires
const PG_LOCK_NOT_AVAILABLE: &str = "55P03";

/// PostgreSQL unique constraint violation
const PG_UNIQUE_VIOLATION: &str = "23505";

/// Durable storage of user balances and the append-only transaction log.
#[async_trait]
pub trait BalanceStore: Send + Sync + 'static {
    type Unit: UnitOfWork;

    /// Read the latest committed state of a user without locking.
    async fn lookup(&self, user_id: UserId) -> StoreResult<Option<User>>;

    /// Open a new atomic unit of work.
    async fn begin(&self) -> StoreResult<Self::Unit>;

    /// Committed records for a user, newest first.
    async fn transactions_for_user(&self, user_id: UserId) -> StoreResult<Vec<TransactionRecord>>;

    /// Check that the store answers.
    async fn ping(&self) -> StoreResult<()>;
}

/// An all-or-nothing sequence of store operations.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn transaction_exists(&mut self, transaction_id: &str) -> StoreResult<bool>;

    /// Lock the user's row until this unit of work ends and return its
    /// current state. Waits for other holders of the same row.
    async fn lock_for_update(&mut self, user_id: UserId) -> StoreResult<Option<User>>;

    /// Overwrite the balance of a row previously locked by this unit of work.
    async fn update_balance(&mut self, user_id: UserId, new_balance: &str) -> StoreResult<()>;

    /// Append a record to the transaction log, returning its sequence id.
    async fn append_transaction(&mut self, record: &NewTransaction) -> StoreResult<i64>;

    async fn commit(self) -> StoreResult<()>;

    async fn abort(self) -> StoreResult<()>;
}

/// PostgreSQL implementation of [`BalanceStore`]
#[derive(Clone)]
pub struct PgBalanceStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgBalanceStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

#[async_trait]
impl BalanceStore for PgBalanceStore {
    type Unit = PgUnitOfWork;

    async fn lookup(&self, user_id: UserId) -> StoreResult<Option<User>> {
        let Ok(id) = i64::try_from(user_id) else {
            return Ok(None);
        };

        let row = sqlx::query(
            "SELECT id, balance::TEXT AS balance, created_at, updated_at
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| user_from_row(&r)).transpose()
    }

    async fn begin(&self) -> StoreResult<PgUnitOfWork> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&lock_timeout_statement(self.lock_timeout))
            .execute(&mut *tx)
            .await?;

        Ok(PgUnitOfWork {
            tx,
            lock_timeout: self.lock_timeout,
            locked: HashSet::new(),
        })
    }

    async fn transactions_for_user(&self, user_id: UserId) -> StoreResult<Vec<TransactionRecord>> {
        let Ok(id) = i64::try_from(user_id) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            "SELECT id, user_id, transaction_id, amount::TEXT AS amount, state, source_type, created_at
             FROM transactions
             WHERE user_id = $1
             ORDER BY id DESC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn ping(&self) -> StoreResult<()> {
        with_timeout(DEFAULT_QUERY_TIMEOUT, sqlx::query("SELECT 1").execute(&self.pool)).await?;
        Ok(())
    }
}

/// A PostgreSQL transaction with a bounded `lock_timeout`.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    lock_timeout: Duration,
    locked: HashSet<UserId>,
}

impl PgUnitOfWork {
    fn classify(&self, err: sqlx::Error, transaction_id: Option<&str>) -> StoreError {
        let code = err
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .map(|code| code.into_owned());

        match (code.as_deref(), transaction_id) {
            (Some(PG_LOCK_NOT_AVAILABLE), _) => StoreError::LockTimeout(self.lock_timeout),
            (Some(PG_UNIQUE_VIOLATION), Some(id)) => StoreError::DuplicateTransactionId(id.to_string()),
            _ => StoreError::Database(err),
        }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn transaction_exists(&mut self, transaction_id: &str) -> StoreResult<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM transactions WHERE transaction_id = $1) AS found")
            .bind(transaction_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(row.get("found"))
    }

    async fn lock_for_update(&mut self, user_id: UserId) -> StoreResult<Option<User>> {
        let Ok(id) = i64::try_from(user_id) else {
            return Ok(None);
        };

        let result = sqlx::query(
            "SELECT id, balance::TEXT AS balance, created_at, updated_at
             FROM users WHERE id = $1
             FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await;

        let row = match result {
            Ok(row) => row,
            Err(err) => return Err(self.classify(err, None)),
        };

        let user = row.map(|r| user_from_row(&r)).transpose()?;
        if user.is_some() {
            self.locked.insert(user_id);
        }
        Ok(user)
    }

    async fn update_balance(&mut self, user_id: UserId, new_balance: &str) -> StoreResult<()> {
        if !self.locked.contains(&user_id) {
            return Err(StoreError::NotLocked(user_id));
        }

        let id = i64::try_from(user_id).map_err(|_| StoreError::NotLocked(user_id))?;
        sqlx::query("UPDATE users SET balance = $1::NUMERIC, updated_at = NOW() WHERE id = $2")
            .bind(new_balance)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn append_transaction(&mut self, record: &NewTransaction) -> StoreResult<i64> {
        let user_id = i64::try_from(record.user_id).map_err(|_| StoreError::NotLocked(record.user_id))?;

        let result = sqlx::query(
            "INSERT INTO transactions (user_id, transaction_id, amount, state, source_type)
             VALUES ($1, $2, $3::NUMERIC, $4, $5)
             RETURNING id",
        )
        .bind(user_id)
        .bind(&record.transaction_id)
        .bind(record.amount.to_string())
        .bind(record.state.as_str())
        .bind(record.source_type.as_str())
        .fetch_one(&mut *self.tx)
        .await;

        match result {
            Ok(row) => Ok(row.get("id")),
            Err(err) => Err(self.classify(err, Some(&record.transaction_id))),
        }
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn abort(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    let id: i64 = row.try_get("id")?;
    Ok(User {
        id: id as UserId,
        balance: row.try_get("balance")?,
        created_at: row.try_get::<NaiveDateTime, _>("created_at")?.and_utc(),
        updated_at: row.try_get::<NaiveDateTime, _>("updated_at")?.and_utc(),
    })
}

fn record_from_row(row: &PgRow) -> StoreResult<TransactionRecord> {
    let user_id: i64 = row.try_get("user_id")?;
    let amount: String = row.try_get("amount")?;
    let state: String = row.try_get("state")?;
    let source_type: String = row.try_get("source_type")?;

    let decode_err = |column: &str, value: &str| {
        StoreError::Database(sqlx::Error::Decode(
            format!("unexpected {column} value {value:?}").into(),
        ))
    };

    Ok(TransactionRecord {
        id: row.try_get("id")?,
        user_id: user_id as UserId,
        transaction_id: row.try_get("transaction_id")?,
        amount: Amount::parse_balance(&amount).map_err(|_| decode_err("amount", &amount))?,
        state: TransactionState::parse(&state).ok_or_else(|| decode_err("state", &state))?,
        source_type: SourceType::parse(&source_type).ok_or_else(|| decode_err("source_type", &source_type))?,
        created_at: row.try_get::<NaiveDateTime, _>("created_at")?.and_utc(),
    })
}
