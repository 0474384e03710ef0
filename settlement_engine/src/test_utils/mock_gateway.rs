use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use log::*;
use mkt_common::Money;

use crate::gateway::{
    CheckoutGateway,
    CheckoutRequest,
    CheckoutSession,
    GatewayError,
    PaymentStatus,
    RefundReceipt,
    SessionStatus,
};

/// An in-memory checkout gateway. Sessions stay unpaid until [`MockGateway::pay_session`] is called.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockGatewayState>>,
}

#[derive(Default)]
struct MockGatewayState {
    sessions: HashMap<String, SessionStatus>,
    requests: HashMap<String, CheckoutRequest>,
    refunds: Vec<RefundReceipt>,
    refunds_by_key: HashMap<String, RefundReceipt>,
    refund_calls: usize,
    refund_delay: Option<Duration>,
    fail_refunds: bool,
    next_id: u64,
}

impl Debug for MockGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockGateway ({} sessions)", self.session_count())
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockGatewayState> {
        self.state.lock().expect("MockGateway state lock was poisoned")
    }

    /// The buyer pays the full amount requested when the session was opened.
    pub fn pay_session(&self, session_id: &str) -> bool {
        let amount = match self.state().requests.get(session_id) {
            Some(request) => request.amount_minor_units,
            None => return false,
        };
        self.pay_session_with_amount(session_id, amount)
    }

    /// Marks the session paid, with the gateway reporting `amount` (in minor units) as captured.
    pub fn pay_session_with_amount(&self, session_id: &str, amount: i64) -> bool {
        let mut state = self.state();
        match state.sessions.get_mut(session_id) {
            Some(session) => {
                session.payment_status = PaymentStatus::Paid;
                session.payment_intent_id = Some(format!("pi_{session_id}"));
                session.amount_total = Some(amount);
                true
            },
            None => false,
        }
    }

    /// Adds or replaces a session verbatim.
    pub fn insert_session(&self, session: SessionStatus) {
        self.state().sessions.insert(session.session_id.clone(), session);
    }

    pub fn set_metadata(&self, session_id: &str, key: &str, value: &str) {
        if let Some(session) = self.state().sessions.get_mut(session_id) {
            session.metadata.insert(key.to_string(), value.to_string());
        }
    }

    pub fn request(&self, session_id: &str) -> Option<CheckoutRequest> {
        self.state().requests.get(session_id).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.state().sessions.len()
    }

    /// The refunds actually made. Replayed requests with a known idempotency key are not repeated here.
    pub fn refunds(&self) -> Vec<RefundReceipt> {
        self.state().refunds.clone()
    }

    /// Every call to [`CheckoutGateway::refund`], including replays and failures.
    pub fn refund_calls(&self) -> usize {
        self.state().refund_calls
    }

    /// Makes every refund take at least `delay`, like a slow gateway.
    pub fn set_refund_delay(&self, delay: Duration) {
        self.state().refund_delay = Some(delay);
    }

    pub fn set_refunds_failing(&self, failing: bool) {
        self.state().fail_refunds = failing;
    }
}

impl CheckoutGateway for MockGateway {
    fn provider_name(&self) -> &str {
        "MockGateway"
    }

    async fn open_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        if request.amount_minor_units <= 0 {
            return Err(GatewayError::Rejected(format!("Invalid amount: {}", request.amount_minor_units)));
        }
        let mut state = self.state();
        state.next_id += 1;
        let session_id = format!("cs_test_{:04}", state.next_id);
        let session = SessionStatus {
            session_id: session_id.clone(),
            payment_status: PaymentStatus::Unpaid,
            payment_intent_id: None,
            amount_total: None,
            metadata: request.metadata.clone(),
        };
        debug!("💳️ MockGateway opened session {session_id} for {}", request.amount_minor_units);
        state.sessions.insert(session_id.clone(), session);
        state.requests.insert(session_id.clone(), request);
        let redirect_url = format!("https://checkout.mock/pay/{session_id}");
        Ok(CheckoutSession { session_id, redirect_url })
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        self.state().sessions.get(session_id).cloned().ok_or_else(|| GatewayError::SessionNotFound(session_id.into()))
    }

    async fn refund(
        &self,
        payment_intent_id: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<RefundReceipt, GatewayError> {
        let delay = {
            let mut state = self.state();
            state.refund_calls += 1;
            state.refund_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        if state.fail_refunds {
            return Err(GatewayError::Unavailable("Refunds are switched off".into()));
        }
        if let Some(receipt) = state.refunds_by_key.get(idempotency_key) {
            debug!("💳️ MockGateway replayed refund {} for key {idempotency_key}", receipt.refund_id);
            return Ok(receipt.clone());
        }
        state.next_id += 1;
        let receipt = RefundReceipt {
            refund_id: format!("re_test_{:04}", state.next_id),
            payment_intent_id: payment_intent_id.to_string(),
            amount,
            status: "succeeded".into(),
        };
        state.refunds_by_key.insert(idempotency_key.to_string(), receipt.clone());
        state.refunds.push(receipt.clone());
        Ok(receipt)
    }
}
