use mkt_common::Money;

use crate::{
    db::traits::WalletLedgerError,
    db_types::{Wallet, WalletBalance, WalletMutation, WalletTransaction, WalletTxStatus, WalletTxType},
};

/// The prepaid wallet ledger.
///
/// Every mutation is keyed by an idempotency key. Replaying a mutation with a key that has already succeeded returns
/// the original transaction without changing the wallet. Reusing a key for a different user, type or amount fails with
/// [`WalletLedgerError::IdempotencyConflict`].
///
/// Implementations must lock the wallet before reading the available balance, so that concurrent debits are
/// serialised and `available` never goes negative.
#[allow(async_fn_in_trait)]
pub trait WalletLedger {
    /// Fetches the wallet for the user. Users without a wallet get an empty, unpersisted one.
    async fn fetch_wallet(&self, user_id: i64) -> Result<Wallet, WalletLedgerError>;

    /// Applies a single mutation atomically and appends the resulting transaction to the history.
    async fn apply_wallet_mutation(&self, mutation: WalletMutation) -> Result<WalletTransaction, WalletLedgerError>;

    async fn fetch_wallet_transaction(&self, idempotency_key: &str)
        -> Result<Option<WalletTransaction>, WalletLedgerError>;

    /// The transaction history for the user, oldest first.
    async fn fetch_wallet_transactions(&self, user_id: i64) -> Result<Vec<WalletTransaction>, WalletLedgerError>;

    /// Moves a transaction to a new status. See [`WalletTxStatus::can_transition_to`].
    async fn update_wallet_transaction_status(
        &self,
        idempotency_key: &str,
        status: WalletTxStatus,
    ) -> Result<WalletTransaction, WalletLedgerError>;

    async fn get_available(&self, user_id: i64) -> Result<WalletBalance, WalletLedgerError> {
        Ok(self.fetch_wallet(user_id).await?.balance())
    }

    async fn debit(
        &self,
        user_id: i64,
        amount: Money,
        idempotency_key: &str,
        note: &str,
    ) -> Result<WalletTransaction, WalletLedgerError> {
        let mutation = WalletMutation::new(user_id, WalletTxType::Debit, amount, idempotency_key).with_note(note);
        self.apply_wallet_mutation(mutation).await
    }

    async fn credit(
        &self,
        user_id: i64,
        amount: Money,
        idempotency_key: &str,
        note: &str,
    ) -> Result<WalletTransaction, WalletLedgerError> {
        let mutation = WalletMutation::new(user_id, WalletTxType::Credit, amount, idempotency_key).with_note(note);
        self.apply_wallet_mutation(mutation).await
    }

    async fn hold(
        &self,
        user_id: i64,
        amount: Money,
        idempotency_key: &str,
        note: &str,
    ) -> Result<WalletTransaction, WalletLedgerError> {
        let mutation = WalletMutation::new(user_id, WalletTxType::Hold, amount, idempotency_key).with_note(note);
        self.apply_wallet_mutation(mutation).await
    }

    async fn release_hold(
        &self,
        user_id: i64,
        amount: Money,
        idempotency_key: &str,
        note: &str,
    ) -> Result<WalletTransaction, WalletLedgerError> {
        let mutation = WalletMutation::new(user_id, WalletTxType::Release, amount, idempotency_key).with_note(note);
        self.apply_wallet_mutation(mutation).await
    }

    async fn refund(
        &self,
        user_id: i64,
        amount: Money,
        idempotency_key: &str,
        note: &str,
    ) -> Result<WalletTransaction, WalletLedgerError> {
        let mutation = WalletMutation::new(user_id, WalletTxType::Refund, amount, idempotency_key).with_note(note);
        self.apply_wallet_mutation(mutation).await
    }
}
