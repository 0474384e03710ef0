//! # Gateway checkout adapter
//!
//! The engine talks to the external card-payment gateway through [`CheckoutGateway`]. Only three calls are needed:
//! open a hosted checkout session, read a session back, and refund a captured payment.
//!
//! `gateway_tools::GatewayApi` implements this trait against a Stripe-compatible HTTP API. The `test_utils` feature
//! provides an in-memory `MockGateway`.
use std::fmt::Display;

use mkt_common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::helpers::Metadata;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not reach the payment gateway: {0}")]
    Unavailable(String),
    #[error("The payment gateway rejected the request: {0}")]
    Rejected(String),
    #[error("Checkout session {0} does not exist")]
    SessionNotFound(String),
    #[error("Could not understand the payment gateway response: {0}")]
    InvalidResponse(String),
}

/// Everything needed to open a hosted checkout session for a single line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub success_url: String,
    pub cancel_url: String,
    pub product_name: String,
    pub amount_minor_units: i64,
    pub currency: String,
    pub client_reference: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    Other(String),
}

impl PaymentStatus {
    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Paid)
    }
}

impl From<&str> for PaymentStatus {
    fn from(value: &str) -> Self {
        match value {
            "paid" => Self::Paid,
            "unpaid" => Self::Unpaid,
            "no_payment_required" => Self::NoPaymentRequired,
            other => Self::Other(other.to_string()),
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Unpaid => write!(f, "unpaid"),
            PaymentStatus::NoPaymentRequired => write!(f, "no_payment_required"),
            PaymentStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub payment_status: PaymentStatus,
    /// The gateway's id for the captured payment, used for refunds.
    pub payment_intent_id: Option<String>,
    /// The captured amount, in minor units.
    pub amount_total: Option<i64>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub refund_id: String,
    pub payment_intent_id: String,
    pub amount: Money,
    pub status: String,
}

#[allow(async_fn_in_trait)]
pub trait CheckoutGateway {
    /// The provider name recorded against orders paid through this gateway.
    fn provider_name(&self) -> &str;

    async fn open_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError>;

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, GatewayError>;

    /// Refunds `amount` of a captured payment. Requests that share an `idempotency_key` refund at most once.
    async fn refund(
        &self,
        payment_intent_id: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<RefundReceipt, GatewayError>;
}
