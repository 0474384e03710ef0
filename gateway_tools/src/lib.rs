//! Talks to a Stripe-compatible hosted checkout API on behalf of the settlement engine.
//!
//! [`GatewayApi`] implements [`settlement_engine::gateway::CheckoutGateway`], so it can be handed straight to
//! `OrderSettlementApi::new`.
mod api;
mod config;
mod error;
mod helpers;

mod data_objects;

pub use api::{GatewayApi, IDEMPOTENCY_KEY_HEADER};
pub use config::GatewayConfig;
pub use data_objects::{GatewayRefund, GatewaySession};
pub use error::GatewayApiError;
pub use helpers::{checkout_form, refund_form};
