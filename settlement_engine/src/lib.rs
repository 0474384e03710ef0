//! Marketplace Settlement Engine
//!
//! The settlement engine turns a buyer's intent to purchase a listing (a material, a machine, a rental, or a bid in a
//! timed auction) into a durable order, after collecting payment from the buyer's prepaid wallet, an external card
//! gateway, or both. It is gateway-agnostic: anything implementing [`gateway::CheckoutGateway`] will do.
//!
//! The library is divided into these main sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. You should never need to access
//!    the database directly. Instead, use the public API. The exception is the data types used in the database. These
//!    are defined in the `db_types` module and are public.
//! 2. The pure settlement rules: [`pricing`], [`bidding`] and [`split_planner`]. These never touch storage.
//! 3. The public API ([`mod@engine_api`]). [`OrderSettlementApi`] drives quotes, confirmations, cancellations,
//!    auctions and reconciliation. [`WalletApi`] manages the prepaid wallets.
//!
//! The engine also emits events that can be subscribed to, for example when an order is confirmed or a bid is
//! outbid. See [`events`].
mod db;

pub mod bidding;
pub mod config;
pub mod db_types;
pub mod engine_api;
pub mod events;
pub mod gateway;
pub mod helpers;
pub mod pricing;
pub mod split_planner;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use config::SettlementConfig;
#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use db::traits::{
    CancelledOrder,
    InsertReconciliationResult,
    ListingManagement,
    MaterializeOutcome,
    MaterializeRejection,
    OrderManagement,
    ReconciliationManagement,
    RefundClaim,
    SettlementDatabase,
    SettlementDbError,
    WalletLedger,
    WalletLedgerError,
};
pub use engine_api::{
    errors::{SettlementError, ValidationError, WalletApiError},
    settlement_objects,
    OrderSettlementApi,
    WalletApi,
};
