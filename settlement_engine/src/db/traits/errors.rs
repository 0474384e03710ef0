use mkt_common::Money;
use thiserror::Error;

use crate::{
    db::traits::MaterializeRejection,
    db_types::{OrderStatusType, ProductKind, WalletTxStatus},
};

#[derive(Debug, Clone, Error)]
pub enum WalletLedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Insufficient wallet funds. {available} is available, but {requested} was requested")]
    InsufficientFunds { available: Money, requested: Money },
    #[error("Wallet amounts must be positive, but got {0}")]
    InvalidAmount(Money),
    #[error("The idempotency key {0} was already used for a different wallet transaction")]
    IdempotencyConflict(String),
    #[error("No wallet transaction exists for key {0}")]
    TransactionNotFound(String),
    #[error("Cannot change a wallet transaction from {from} to {to}")]
    IllegalStatusChange { from: WalletTxStatus, to: WalletTxStatus },
}

impl From<sqlx::Error> for WalletLedgerError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum SettlementDbError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("{0} listing #{1} does not exist")]
    ListingNotFound(ProductKind, i64),
    #[error("Order #{0} does not exist")]
    OrderNotFound(i64),
    #[error("Reconciliation item #{0} does not exist")]
    ReconciliationItemNotFound(i64),
    #[error("Order rejected: {0}")]
    Rejected(#[from] MaterializeRejection),
    #[error("Order #{0} cannot be cancelled because it is {1}")]
    OrderNotCancellable(i64, OrderStatusType),
    #[error("Order #{id} is {actual}, not {expected}")]
    OrderStatusChanged { id: i64, expected: OrderStatusType, actual: OrderStatusType },
    #[error("Wallet error: {0}")]
    Ledger(#[from] WalletLedgerError),
}

impl From<sqlx::Error> for SettlementDbError {
    fn from(e: sqlx::Error) -> Self {
        Self::DatabaseError(e.to_string())
    }
}
