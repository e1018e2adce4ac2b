//! Read-only balance lookups.

use std::sync::Arc;

use log::{error, info, warn};

use super::errors::{LedgerError, LedgerResult};
use super::models::{BalanceView, UserId};
use crate::amount::Amount;
use crate::db::BalanceStore;

/// Reads the latest committed balance. Takes no lock and caches nothing.
pub struct BalanceQuery<S: BalanceStore> {
    store: Arc<S>,
}

impl<S: BalanceStore> Clone for BalanceQuery<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: BalanceStore> BalanceQuery<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Get the formatted balance for a user
    ///
    /// # Errors
    ///
    /// * `LedgerError::UserNotFound` - No such user
    /// * `LedgerError::CorruptBalance` - Stored balance does not parse
    pub async fn get_balance(&self, user_id: UserId) -> LedgerResult<BalanceView> {
        info!("Getting user balance: user_id={user_id}");

        let user = match self.store.lookup(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!("User not found: user_id={user_id}");
                return Err(LedgerError::UserNotFound(user_id));
            }
            Err(e) => {
                error!("Failed to get user: user_id={user_id} error={e}");
                return Err(e.into());
            }
        };

        let balance = Amount::parse_balance(&user.balance).map_err(|source| {
            error!("Invalid balance format: user_id={user_id} balance={:?} error={source}", user.balance);
            LedgerError::CorruptBalance { user_id, source }
        })?;

        info!("Balance retrieved successfully: user_id={user_id} balance={balance}");
        Ok(BalanceView {
            user_id: user.id,
            balance,
        })
    }
}
