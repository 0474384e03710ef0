//! # Database management and control.
//!
//! This module defines the contracts that settlement engine database *backends* must fulfil.
//!
//! * [`SettlementDatabase`] is the highest level of behaviour. It owns the multi-step atomic operations: turning a paid
//!   checkout into an order, and cancelling an order.
//! * [`ListingManagement`] covers the listing repository: fetching listings, stock and status changes.
//! * [`OrderManagement`] provides queries over the unified order store, plus status changes.
//! * [`WalletLedger`] is the prepaid wallet: balances, holds and the append-only transaction history.
//! * [`ReconciliationManagement`] is the queue of captured payments that could not be turned into orders.
mod data_objects;
mod errors;
mod listing_management;
mod order_management;
mod reconciliation_management;
mod settlement_database;
mod wallet_ledger;

pub use data_objects::{
    CancelledOrder,
    InsertReconciliationResult,
    MaterializeOutcome,
    MaterializeRejection,
    RefundClaim,
};
pub use errors::{SettlementDbError, WalletLedgerError};
pub use listing_management::ListingManagement;
pub use order_management::OrderManagement;
pub use reconciliation_management::ReconciliationManagement;
pub use settlement_database::SettlementDatabase;
pub use wallet_ledger::WalletLedger;
