//! In-process [`BalanceStore`] for tests, benchmarks and local runs.
//!
//! Each user row has its own async mutex standing in for a database row
//! lock. A unit of work buffers its writes and applies them in one step on
//! commit, so an aborted or dropped unit leaves nothing behind.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::errors::{StoreError, StoreResult};
use super::repository::{BalanceStore, UnitOfWork};
use super::timeouts::{DEFAULT_LOCK_TIMEOUT, with_lock_timeout};
use crate::amount::Amount;
use crate::ledger::{NewTransaction, TransactionRecord, User, UserId};

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    row_locks: HashMap<UserId, Arc<Mutex<()>>>,
    transactions: Vec<TransactionRecord>,
    transaction_ids: HashSet<String>,
    next_record_id: i64,
}

/// In-memory balance store with per-user row locks
#[derive(Clone)]
pub struct MemoryBalanceStore {
    state: Arc<Mutex<MemoryState>>,
    lock_timeout: Duration,
}

impl Default for MemoryBalanceStore {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl MemoryBalanceStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                next_record_id: 1,
                ..MemoryState::default()
            })),
            lock_timeout,
        }
    }

    /// Insert or replace a user row.
    pub async fn insert_user(&self, user_id: UserId, balance: Amount) {
        let now = Utc::now();
        let mut state = self.state.lock().await;
        let created_at = state.users.get(&user_id).map_or(now, |u| u.created_at);
        state.users.insert(
            user_id,
            User {
                id: user_id,
                balance: balance.to_string(),
                created_at,
                updated_at: now,
            },
        );
        state.row_locks.entry(user_id).or_default();
    }

    /// Overwrite the stored balance text as-is, bypassing the codec.
    pub async fn corrupt_balance(&self, user_id: UserId, raw: &str) {
        if let Some(user) = self.state.lock().await.users.get_mut(&user_id) {
            user.balance = raw.to_string();
        }
    }

    /// Number of committed transaction records across all users.
    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }
}

#[async_trait]
impl BalanceStore for MemoryBalanceStore {
    type Unit = MemoryUnitOfWork;

    async fn lookup(&self, user_id: UserId) -> StoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn begin(&self) -> StoreResult<MemoryUnitOfWork> {
        Ok(MemoryUnitOfWork {
            state: Arc::clone(&self.state),
            lock_timeout: self.lock_timeout,
            guards: HashMap::new(),
            balance_writes: HashMap::new(),
            appended: Vec::new(),
        })
    }

    async fn transactions_for_user(&self, user_id: UserId) -> StoreResult<Vec<TransactionRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Unit of work over [`MemoryBalanceStore`]. Row locks are released on drop.
pub struct MemoryUnitOfWork {
    state: Arc<Mutex<MemoryState>>,
    lock_timeout: Duration,
    guards: HashMap<UserId, OwnedMutexGuard<()>>,
    balance_writes: HashMap<UserId, String>,
    appended: Vec<(i64, NewTransaction)>,
}

impl MemoryUnitOfWork {
    fn has_pending(&self, transaction_id: &str) -> bool {
        self.appended.iter().any(|(_, r)| r.transaction_id == transaction_id)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn transaction_exists(&mut self, transaction_id: &str) -> StoreResult<bool> {
        if self.has_pending(transaction_id) {
            return Ok(true);
        }
        Ok(self.state.lock().await.transaction_ids.contains(transaction_id))
    }

    async fn lock_for_update(&mut self, user_id: UserId) -> StoreResult<Option<User>> {
        if !self.guards.contains_key(&user_id) {
            let row_lock = match self.state.lock().await.row_locks.get(&user_id) {
                Some(row_lock) => Arc::clone(row_lock),
                None => return Ok(None),
            };
            let guard = with_lock_timeout(self.lock_timeout, row_lock.lock_owned()).await?;
            self.guards.insert(user_id, guard);
        }

        // Re-read after the lock is held so the previous holder's commit is visible.
        let current = self.state.lock().await.users.get(&user_id).cloned();
        let mut user = match current {
            Some(user) => user,
            None => {
                self.guards.remove(&user_id);
                return Ok(None);
            }
        };
        if let Some(pending) = self.balance_writes.get(&user_id) {
            user.balance = pending.clone();
        }
        Ok(Some(user))
    }

    async fn update_balance(&mut self, user_id: UserId, new_balance: &str) -> StoreResult<()> {
        if !self.guards.contains_key(&user_id) {
            return Err(StoreError::NotLocked(user_id));
        }
        self.balance_writes.insert(user_id, new_balance.to_string());
        Ok(())
    }

    async fn append_transaction(&mut self, record: &NewTransaction) -> StoreResult<i64> {
        let mut state = self.state.lock().await;
        if self.has_pending(&record.transaction_id) || state.transaction_ids.contains(&record.transaction_id) {
            return Err(StoreError::DuplicateTransactionId(record.transaction_id.clone()));
        }

        // Reserve the sequence id now; gaps after an abort match a database sequence.
        let id = state.next_record_id;
        state.next_record_id += 1;
        drop(state);

        self.appended.push((id, record.clone()));
        Ok(id)
    }

    async fn commit(mut self) -> StoreResult<()> {
        let mut state = self.state.lock().await;

        // Another unit may have committed one of our ids after our append.
        if let Some(conflict) = self
            .appended
            .iter()
            .find(|(_, r)| state.transaction_ids.contains(&r.transaction_id))
        {
            return Err(StoreError::DuplicateTransactionId(conflict.1.transaction_id.clone()));
        }

        let now = Utc::now();
        for (user_id, balance) in self.balance_writes.drain() {
            if let Some(user) = state.users.get_mut(&user_id) {
                user.balance = balance;
                user.updated_at = now;
            }
        }

        for (id, record) in self.appended.drain(..) {
            state.transaction_ids.insert(record.transaction_id.clone());
            state.transactions.push(TransactionRecord {
                id,
                user_id: record.user_id,
                transaction_id: record.transaction_id,
                amount: record.amount,
                state: record.state,
                source_type: record.source_type,
                created_at: now,
            });
        }

        Ok(())
    }

    async fn abort(self) -> StoreResult<()> {
        Ok(())
    }
}
