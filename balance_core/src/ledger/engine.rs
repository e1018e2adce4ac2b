//! Transaction engine: applies one balance adjustment per unit of work.

use std::sync::Arc;

use log::{error, info, warn};

use super::errors::{LedgerError, LedgerResult};
use super::models::{NewTransaction, SourceType, TransactionReceipt, TransactionRequest, TransactionState, UserId};
use crate::amount::{Amount, AmountError};
use crate::db::{BalanceStore, UnitOfWork};

/// Applies transactions against a [`BalanceStore`] exactly once per
/// transaction id.
pub struct TransactionEngine<S: BalanceStore> {
    store: Arc<S>,
}

impl<S: BalanceStore> Clone for TransactionEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: BalanceStore> TransactionEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Process a transaction for a user
    ///
    /// Runs the duplicate check, row lock, arithmetic, balance write and log
    /// append in one unit of work. Any failure aborts it, so either both the
    /// balance change and its record become visible or neither does.
    ///
    /// The duplicate check runs before the row lock so replays never wait on
    /// a busy user.
    ///
    /// # Errors
    ///
    /// * `LedgerError::DuplicateTransaction` - Transaction id already recorded
    /// * `LedgerError::UserNotFound` - No such user
    /// * `LedgerError::InsufficientBalance` - A debit would go below zero
    /// * `LedgerError::LockTimeout` - Row lock wait exceeded its bound
    pub async fn process(
        &self,
        user_id: UserId,
        request: &TransactionRequest,
        source_type: SourceType,
    ) -> LedgerResult<TransactionReceipt> {
        info!(
            "Starting transaction processing: user_id={user_id} transaction_id={} state={} amount={} source_type={source_type}",
            request.transaction_id, request.state, request.amount
        );

        if !request.amount.is_positive() {
            error!(
                "Non-positive amount reached the engine: user_id={user_id} transaction_id={} amount={}",
                request.transaction_id, request.amount
            );
            return Err(LedgerError::InvalidAmount(AmountError::NotPositive));
        }

        let mut unit = self.store.begin().await?;
        match apply(&mut unit, user_id, request, source_type).await {
            Ok(receipt) => {
                unit.commit().await.map_err(|e| {
                    let err = LedgerError::from(e);
                    if let LedgerError::DuplicateTransaction(_) = err {
                        warn!(
                            "Duplicate transaction detected at commit: user_id={user_id} transaction_id={}",
                            request.transaction_id
                        );
                    }
                    err
                })?;

                info!(
                    "Transaction processed successfully: user_id={user_id} transaction_id={} old_balance={} new_balance={}",
                    request.transaction_id, receipt.previous_balance, receipt.new_balance
                );
                Ok(receipt)
            }
            Err(err) => {
                if let Err(abort_err) = unit.abort().await {
                    warn!(
                        "Failed to abort unit of work: user_id={user_id} transaction_id={} error={abort_err}",
                        request.transaction_id
                    );
                }
                Err(err)
            }
        }
    }
}

async fn apply<U: UnitOfWork>(
    unit: &mut U,
    user_id: UserId,
    request: &TransactionRequest,
    source_type: SourceType,
) -> LedgerResult<TransactionReceipt> {
    let transaction_id = request.transaction_id.as_str();

    if unit.transaction_exists(transaction_id).await? {
        warn!("Duplicate transaction detected: user_id={user_id} transaction_id={transaction_id}");
        return Err(LedgerError::DuplicateTransaction(request.transaction_id.clone()));
    }

    let user = match unit.lock_for_update(user_id).await? {
        Some(user) => user,
        None => {
            warn!("User not found for transaction: user_id={user_id} transaction_id={transaction_id}");
            return Err(LedgerError::UserNotFound(user_id));
        }
    };

    let current_balance = Amount::parse_balance(&user.balance).map_err(|source| {
        error!(
            "Invalid stored balance: user_id={user_id} balance={:?} error={source}",
            user.balance
        );
        LedgerError::CorruptBalance { user_id, source }
    })?;

    let new_balance = calculate_new_balance(current_balance, request.amount, request.state).inspect_err(|err| {
        if let LedgerError::InsufficientBalance { available, required } = err {
            warn!(
                "Insufficient balance for transaction: user_id={user_id} transaction_id={transaction_id} current_balance={available} amount={required}"
            );
        }
    })?;

    unit.update_balance(user_id, &new_balance.to_string()).await?;

    let record = NewTransaction {
        user_id,
        transaction_id: request.transaction_id.clone(),
        amount: request.amount,
        state: request.state,
        source_type,
    };
    let record_id = unit.append_transaction(&record).await.map_err(|e| {
        error!("Failed to create transaction record: user_id={user_id} transaction_id={transaction_id} error={e}");
        LedgerError::from(e)
    })?;

    Ok(TransactionReceipt {
        record_id,
        user_id,
        transaction_id: request.transaction_id.clone(),
        previous_balance: current_balance,
        new_balance,
    })
}

/// New balance after applying `amount` in direction `state`.
///
/// # Errors
///
/// * `LedgerError::InsufficientBalance` - `lose` would go below zero
/// * `LedgerError::BalanceOverflow` - result exceeds the stored balance range
pub fn calculate_new_balance(current: Amount, amount: Amount, state: TransactionState) -> LedgerResult<Amount> {
    match state {
        TransactionState::Win => current.checked_add(amount).ok_or(LedgerError::BalanceOverflow),
        TransactionState::Lose => {
            let new_balance = current.checked_sub(amount).ok_or(LedgerError::BalanceOverflow)?;
            if new_balance.is_negative() {
                return Err(LedgerError::InsufficientBalance {
                    available: current,
                    required: amount,
                });
            }
            Ok(new_balance)
        }
    }
}
