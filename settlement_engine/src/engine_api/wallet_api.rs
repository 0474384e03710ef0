use std::fmt::Debug;

use log::*;
use mkt_common::Money;

use crate::{
    db::traits::WalletLedger,
    db_types::{WalletBalance, WalletTransaction, WalletTxStatus},
    engine_api::errors::WalletApiError,
};

/// Wallet operations for buyers and back-office tools: top-ups, holds, refunds and history.
///
/// Every money-moving call takes an idempotency key. Retrying a call with the same key and arguments is harmless.
#[derive(Clone)]
pub struct WalletApi<B> {
    db: B,
}

impl<B: Debug> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi ({:?})", self.db)
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> WalletApi<B>
where B: WalletLedger
{
    pub async fn balance(&self, user_id: i64) -> Result<WalletBalance, WalletApiError> {
        let balance = self.db.get_available(user_id).await?;
        trace!("👛️ Wallet balance for user #{user_id}: {balance:?}");
        Ok(balance)
    }

    /// Adds funds to the wallet, e.g. after a top-up payment cleared.
    pub async fn top_up(&self, user_id: i64, amount: Money, key: &str) -> Result<WalletTransaction, WalletApiError> {
        let tx = self.db.credit(user_id, amount, key, "Top-up").await?;
        info!("👛️ Wallet of user #{user_id} topped up with {amount}. Balance is now {}", tx.balance_after);
        Ok(tx)
    }

    pub async fn credit(
        &self,
        user_id: i64,
        amount: Money,
        key: &str,
        note: &str,
    ) -> Result<WalletTransaction, WalletApiError> {
        let tx = self.db.credit(user_id, amount, key, note).await?;
        info!("👛️ Credited {amount} to the wallet of user #{user_id}. {note}");
        Ok(tx)
    }

    pub async fn debit(
        &self,
        user_id: i64,
        amount: Money,
        key: &str,
        note: &str,
    ) -> Result<WalletTransaction, WalletApiError> {
        let tx = self.db.debit(user_id, amount, key, note).await.map_err(|e| {
            debug!("👛️ Could not debit {amount} from the wallet of user #{user_id}. {e}");
            e
        })?;
        info!("👛️ Debited {amount} from the wallet of user #{user_id}. {note}");
        Ok(tx)
    }

    /// Reserves funds without spending them. Held funds are not available until released.
    pub async fn hold(
        &self,
        user_id: i64,
        amount: Money,
        key: &str,
        note: &str,
    ) -> Result<WalletTransaction, WalletApiError> {
        let tx = self.db.hold(user_id, amount, key, note).await?;
        info!("👛️ Holding {amount} in the wallet of user #{user_id}. {note}");
        Ok(tx)
    }

    pub async fn release_hold(
        &self,
        user_id: i64,
        amount: Money,
        key: &str,
        note: &str,
    ) -> Result<WalletTransaction, WalletApiError> {
        let tx = self.db.release_hold(user_id, amount, key, note).await?;
        info!("👛️ Released a hold of {amount} in the wallet of user #{user_id}. {note}");
        Ok(tx)
    }

    pub async fn refund(
        &self,
        user_id: i64,
        amount: Money,
        key: &str,
        note: &str,
    ) -> Result<WalletTransaction, WalletApiError> {
        let tx = self.db.refund(user_id, amount, key, note).await?;
        info!("👛️ Refunded {amount} to the wallet of user #{user_id}. {note}");
        Ok(tx)
    }

    /// The user's transaction history, oldest first.
    pub async fn history(&self, user_id: i64) -> Result<Vec<WalletTransaction>, WalletApiError> {
        Ok(self.db.fetch_wallet_transactions(user_id).await?)
    }

    pub async fn transaction(&self, key: &str) -> Result<Option<WalletTransaction>, WalletApiError> {
        Ok(self.db.fetch_wallet_transaction(key).await?)
    }

    pub async fn update_transaction_status(
        &self,
        key: &str,
        status: WalletTxStatus,
    ) -> Result<WalletTransaction, WalletApiError> {
        let tx = self.db.update_wallet_transaction_status(key, status).await?;
        info!("👛️ Wallet transaction {key} is now {status}");
        Ok(tx)
    }
}
