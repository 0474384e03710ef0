use std::collections::HashMap;

use mkt_common::Money;
use serde::{Deserialize, Serialize};
use settlement_engine::gateway::{CheckoutSession, PaymentStatus, RefundReceipt, SessionStatus};

use crate::GatewayApiError;

/// A checkout session, as returned by both the create and retrieve endpoints.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewaySession {
    pub id: String,
    pub url: Option<String>,
    pub payment_status: String,
    /// Null until the buyer has paid.
    pub payment_intent: Option<String>,
    pub amount_total: Option<i64>,
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl GatewaySession {
    pub fn into_checkout_session(self) -> Result<CheckoutSession, GatewayApiError> {
        let redirect_url = self
            .url
            .ok_or_else(|| GatewayApiError::JsonError(format!("Checkout session {} has no redirect url", self.id)))?;
        Ok(CheckoutSession { session_id: self.id, redirect_url })
    }
}

impl From<GatewaySession> for SessionStatus {
    fn from(session: GatewaySession) -> Self {
        Self {
            payment_status: PaymentStatus::from(session.payment_status.as_str()),
            session_id: session.id,
            payment_intent_id: session.payment_intent,
            amount_total: session.amount_total,
            metadata: session.metadata,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayRefund {
    pub id: String,
    pub payment_intent: Option<String>,
    pub amount: i64,
    pub status: String,
}

impl GatewayRefund {
    pub fn into_receipt(self, payment_intent_id: &str) -> RefundReceipt {
        RefundReceipt {
            refund_id: self.id,
            payment_intent_id: self.payment_intent.unwrap_or_else(|| payment_intent_id.to_string()),
            amount: Money::from_minor_units(self.amount),
            status: self.status,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_paid_session() {
        let json = r#"{
            "id": "cs_test_a1b2",
            "object": "checkout.session",
            "url": null,
            "payment_status": "paid",
            "payment_intent": "pi_3Nq",
            "amount_total": 1000,
            "client_reference_id": "0f3a",
            "currency": "usd",
            "metadata": { "user_id": "2", "target_kind": "Material" }
        }"#;
        let session: GatewaySession = serde_json::from_str(json).unwrap();
        let status = SessionStatus::from(session.clone());
        assert_eq!(status.session_id, "cs_test_a1b2");
        assert!(status.payment_status.is_paid());
        assert_eq!(status.payment_intent_id.as_deref(), Some("pi_3Nq"));
        assert_eq!(status.amount_total, Some(1000));
        assert_eq!(status.metadata["target_kind"], "Material");
        let err = session.into_checkout_session().unwrap_err();
        assert!(matches!(err, GatewayApiError::JsonError(_)));
    }

    #[test]
    fn parse_open_session() {
        let json = r#"{
            "id": "cs_test_c3d4",
            "url": "https://checkout.stripe.com/c/pay/cs_test_c3d4",
            "payment_status": "unpaid",
            "payment_intent": null,
            "amount_total": 90000
        }"#;
        let session: GatewaySession = serde_json::from_str(json).unwrap();
        assert!(session.metadata.is_empty());
        let status = SessionStatus::from(session.clone());
        assert_eq!(status.payment_status, PaymentStatus::Unpaid);
        assert!(status.payment_intent_id.is_none());
        let checkout = session.into_checkout_session().unwrap();
        assert_eq!(checkout.session_id, "cs_test_c3d4");
        assert!(checkout.redirect_url.ends_with("cs_test_c3d4"));
    }

    #[test]
    fn parse_refund() {
        let json = r#"{"id": "re_1", "object": "refund", "payment_intent": null, "amount": 1400, "status": "pending"}"#;
        let refund: GatewayRefund = serde_json::from_str(json).unwrap();
        let receipt = refund.into_receipt("pi_9");
        assert_eq!(receipt.refund_id, "re_1");
        assert_eq!(receipt.payment_intent_id, "pi_9");
        assert_eq!(receipt.amount, Money::from_minor_units(1400));
        assert_eq!(receipt.status, "pending");
    }
}
