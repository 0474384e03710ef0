//! # Settlement engine public API
//!
//! * [`settlement_api`] is the primary API. [`OrderSettlementApi`] quotes purchases, opens checkout sessions, confirms
//!   them into orders, and handles cancellations, auctions and reconciliation.
//! * [`wallet_api`] exposes the prepaid wallet ledger to buyers and back-office tools.
//!
//! The other submodules hold the request and response types and the error types.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API needs, and
//! for [`OrderSettlementApi`], a [`crate::gateway::CheckoutGateway`].
//!
//! ```rust,ignore
//! use settlement_engine::{SettlementConfig, OrderSettlementApi, SqliteDatabase, events::EventProducers};
//! let db = SqliteDatabase::new_with_url(&url, 25).await?;
//! let api = OrderSettlementApi::new(db, gateway, SettlementConfig::from_env_or_default(), EventProducers::default());
//! let quote = api.quote(&RequestContext::new(buyer_id), request).await?;
//! ```

pub mod errors;
mod order_lifecycle;
mod reconciliation;
pub mod settlement_api;
pub mod settlement_objects;
pub mod wallet_api;

pub use settlement_api::OrderSettlementApi;
pub use wallet_api::WalletApi;
