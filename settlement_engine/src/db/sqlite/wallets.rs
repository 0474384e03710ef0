use chrono::Utc;
use log::{debug, trace, warn};
use mkt_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db::traits::WalletLedgerError,
    db_types::{Wallet, WalletMutation, WalletTransaction, WalletTxStatus, WalletTxType},
};

/// Creates the wallet row if it does not exist yet, then takes the write lock on it by bumping its version.
pub async fn lock_wallet(user_id: i64, conn: &mut SqliteConnection) -> Result<(), WalletLedgerError> {
    let now = Utc::now();
    sqlx::query(
        r#"
            INSERT INTO wallets (user_id, balance, reserved, version, created_at, updated_at)
            VALUES (?, 0, 0, 0, ?, ?)
            ON CONFLICT (user_id) DO NOTHING;
        "#,
    )
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    sqlx::query("UPDATE wallets SET version = version + 1, updated_at = ? WHERE user_id = ?")
        .bind(now)
        .bind(user_id)
        .execute(conn)
        .await?;
    trace!("🗃️ Locked wallet for user #{user_id}");
    Ok(())
}

pub async fn fetch_wallet(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<Wallet>, WalletLedgerError> {
    let wallet = sqlx::query_as("SELECT * FROM wallets WHERE user_id = ?").bind(user_id).fetch_optional(conn).await?;
    Ok(wallet)
}

pub async fn fetch_transaction(
    key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletTransaction>, WalletLedgerError> {
    let tx = sqlx::query_as("SELECT * FROM wallet_transactions WHERE idempotency_key = ?")
        .bind(key)
        .fetch_optional(conn)
        .await?;
    Ok(tx)
}

pub async fn fetch_transactions(
    user_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<WalletTransaction>, WalletLedgerError> {
    let txs = sqlx::query_as("SELECT * FROM wallet_transactions WHERE user_id = ? ORDER BY id ASC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    Ok(txs)
}

/// Applies the mutation to the wallet and appends the ledger entry.
///
/// This is not atomic on its own. Run it inside a transaction and pass `&mut tx` as the connection.
pub async fn apply_mutation(
    mutation: WalletMutation,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, WalletLedgerError> {
    if !mutation.amount.is_positive() {
        return Err(WalletLedgerError::InvalidAmount(mutation.amount));
    }
    let user_id = mutation.user_id;
    lock_wallet(user_id, &mut *conn).await?;
    if let Some(existing) = fetch_transaction(&mutation.idempotency_key, &mut *conn).await? {
        return if mutation.matches(&existing) && existing.status == WalletTxStatus::Succeeded {
            debug!("🗃️ Wallet transaction {} has already been applied", existing.idempotency_key);
            Ok(existing)
        } else {
            warn!(
                "🗃️ Wallet transaction key {} was reused for a {} of {} by user #{user_id}",
                mutation.idempotency_key, mutation.tx_type, mutation.amount
            );
            Err(WalletLedgerError::IdempotencyConflict(mutation.idempotency_key))
        };
    }
    let wallet = fetch_wallet(user_id, &mut *conn)
        .await?
        .ok_or_else(|| WalletLedgerError::DatabaseError(format!("The wallet for user #{user_id} was not created")))?;
    let amount = mutation.amount;
    let (balance, reserved) = match mutation.tx_type {
        WalletTxType::Debit | WalletTxType::Hold => {
            let available = wallet.available();
            if amount > available {
                debug!(
                    "🗃️ User #{user_id} has {available} available, which cannot cover a {} of {amount}",
                    mutation.tx_type
                );
                return Err(WalletLedgerError::InsufficientFunds { available, requested: amount });
            }
            if mutation.tx_type == WalletTxType::Debit {
                (wallet.balance - amount, wallet.reserved)
            } else {
                (wallet.balance, wallet.reserved + amount)
            }
        },
        WalletTxType::Release => (wallet.balance, (wallet.reserved - amount).non_negative()),
        WalletTxType::Credit | WalletTxType::Refund | WalletTxType::Adjustment => {
            (wallet.balance + amount, wallet.reserved)
        },
    };
    update_balances(user_id, balance, reserved, &mut *conn).await?;
    let now = Utc::now();
    let tx: WalletTransaction = sqlx::query_as(
        r#"
            INSERT INTO wallet_transactions (
                user_id,
                tx_type,
                status,
                amount,
                balance_after,
                reserved_after,
                idempotency_key,
                note,
                created_at
            ) VALUES (?, ?, 'Succeeded', ?, ?, ?, ?, ?, ?)
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(mutation.tx_type)
    .bind(amount)
    .bind(balance)
    .bind(reserved)
    .bind(mutation.idempotency_key)
    .bind(mutation.note)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!(
        "🗃️ {} of {amount} applied to the wallet of user #{user_id}. Balance: {balance}, reserved: {reserved}",
        tx.tx_type
    );
    Ok(tx)
}

async fn update_balances(
    user_id: i64,
    balance: Money,
    reserved: Money,
    conn: &mut SqliteConnection,
) -> Result<(), WalletLedgerError> {
    sqlx::query("UPDATE wallets SET balance = ?, reserved = ?, updated_at = ? WHERE user_id = ?")
        .bind(balance)
        .bind(reserved)
        .bind(Utc::now())
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Changes the status of a ledger entry while holding the lock on its wallet. Balances are not touched.
pub async fn update_transaction_status(
    key: &str,
    status: WalletTxStatus,
    conn: &mut SqliteConnection,
) -> Result<WalletTransaction, WalletLedgerError> {
    sqlx::query(
        r#"
            UPDATE wallets SET version = version + 1
            WHERE user_id = (SELECT user_id FROM wallet_transactions WHERE idempotency_key = ?);
        "#,
    )
    .bind(key)
    .execute(&mut *conn)
    .await?;
    let tx = fetch_transaction(key, &mut *conn)
        .await?
        .ok_or_else(|| WalletLedgerError::TransactionNotFound(key.to_string()))?;
    if tx.status == status {
        return Ok(tx);
    }
    if !tx.status.can_transition_to(status) {
        return Err(WalletLedgerError::IllegalStatusChange { from: tx.status, to: status });
    }
    let tx: WalletTransaction =
        sqlx::query_as("UPDATE wallet_transactions SET status = ? WHERE idempotency_key = ? RETURNING *")
            .bind(status)
            .bind(key)
            .fetch_one(conn)
            .await?;
    debug!("🗃️ Wallet transaction {key} is now {status}");
    Ok(tx)
}
