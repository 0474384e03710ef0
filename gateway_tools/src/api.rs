use std::sync::Arc;

use log::*;
use mkt_common::Money;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
    Request,
};
use serde::de::DeserializeOwned;
use settlement_engine::gateway::{
    CheckoutGateway,
    CheckoutRequest,
    CheckoutSession,
    GatewayError,
    RefundReceipt,
    SessionStatus,
};

use crate::{
    config::GatewayConfig,
    data_objects::{GatewayRefund, GatewaySession},
    helpers::{checkout_form, refund_form},
    GatewayApiError,
};

/// Header that makes a POST safe to retry: the gateway answers repeats with the original result.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl std::fmt::Debug for GatewayApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GatewayApi ({}, {})", self.config.provider, self.config.api_url)
    }
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let mut val = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Sends a request with an optional form-encoded body and deserializes the JSON response.
    pub async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: Option<&[(String, String)]>,
    ) -> Result<T, GatewayApiError> {
        let request = self.build_request(method, path, form, None)?;
        self.execute(request).await
    }

    /// Builds a request with an optional form-encoded body and idempotency key.
    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        form: Option<&[(String, String)]>,
        idempotency_key: Option<&str>,
    ) -> Result<Request, GatewayApiError> {
        let mut req = self.client.request(method, self.url(path));
        if let Some(form) = form {
            req = req.form(form);
        }
        if let Some(key) = idempotency_key {
            req = req.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        req.build().map_err(|e| GatewayApiError::Initialization(e.to_string()))
    }

    async fn execute<T: DeserializeOwned>(&self, request: Request) -> Result<T, GatewayApiError> {
        trace!("💳️ Sending REST query: {} {}", request.method(), request.url());
        let response =
            self.client.execute(request).await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("💳️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    pub async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<GatewaySession, GatewayApiError> {
        let form = checkout_form(request);
        debug!("💳️ Opening checkout session for {} ({})", request.product_name, request.client_reference);
        let session = self.rest_query::<GatewaySession>(Method::POST, "/v1/checkout/sessions", Some(&form)).await?;
        info!("💳️ Opened checkout session {} for {} minor units", session.id, request.amount_minor_units);
        Ok(session)
    }

    pub async fn fetch_checkout_session(&self, session_id: &str) -> Result<GatewaySession, GatewayApiError> {
        let path = format!("/v1/checkout/sessions/{session_id}");
        debug!("💳️ Fetching checkout session {session_id}");
        self.rest_query::<GatewaySession>(Method::GET, &path, None).await
    }

    pub fn refund_request(
        &self,
        payment_intent_id: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<Request, GatewayApiError> {
        let form = refund_form(payment_intent_id, amount);
        self.build_request(Method::POST, "/v1/refunds", Some(&form), Some(idempotency_key))
    }

    pub async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<GatewayRefund, GatewayApiError> {
        debug!("💳️ Refunding {amount} of {payment_intent_id} ({idempotency_key})");
        let request = self.refund_request(payment_intent_id, amount, idempotency_key)?;
        let refund = self.execute::<GatewayRefund>(request).await?;
        info!("💳️ Refund {} for {amount} of {payment_intent_id} is {}", refund.id, refund.status);
        Ok(refund)
    }
}

impl CheckoutGateway for GatewayApi {
    fn provider_name(&self) -> &str {
        &self.config.provider
    }

    async fn open_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        let session = self.create_checkout_session(&request).await?;
        Ok(session.into_checkout_session()?)
    }

    async fn session_status(&self, session_id: &str) -> Result<SessionStatus, GatewayError> {
        match self.fetch_checkout_session(session_id).await {
            Ok(session) => Ok(session.into()),
            Err(GatewayApiError::QueryError { status: 404, .. }) => {
                warn!("💳️ Checkout session {session_id} does not exist");
                Err(GatewayError::SessionNotFound(session_id.to_string()))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn refund(
        &self,
        payment_intent_id: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<RefundReceipt, GatewayError> {
        let refund = self.create_refund(payment_intent_id, amount, idempotency_key).await?;
        Ok(refund.into_receipt(payment_intent_id))
    }
}
