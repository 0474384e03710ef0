use log::*;
use mkt_common::Secret;

const DEFAULT_API_URL: &str = "https://api.stripe.com";
const DEFAULT_PROVIDER: &str = "Stripe";

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub api_url: String,
    pub secret_key: Secret<String>,
    /// The provider name recorded against orders paid through this gateway
    pub provider: String,
}

impl GatewayConfig {
    pub fn new<S: Into<String>>(api_url: S, secret_key: S, provider: S) -> Self {
        Self { api_url: api_url.into(), secret_key: Secret::new(secret_key.into()), provider: provider.into() }
    }

    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("MPS_GATEWAY_API_URL").unwrap_or_else(|_| {
            info!("🪛️ MPS_GATEWAY_API_URL not set, using {DEFAULT_API_URL}");
            DEFAULT_API_URL.to_string()
        });
        let secret_key = Secret::new(std::env::var("MPS_GATEWAY_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ MPS_GATEWAY_SECRET_KEY not set, using (probably useless) default");
            "sk_test_00000000000000".to_string()
        }));
        let provider = std::env::var("MPS_GATEWAY_PROVIDER").unwrap_or_else(|_| {
            info!("🪛️ MPS_GATEWAY_PROVIDER not set, using {DEFAULT_PROVIDER}");
            DEFAULT_PROVIDER.to_string()
        });
        Self { api_url: api_url.trim_end_matches('/').to_string(), secret_key, provider }
    }
}
