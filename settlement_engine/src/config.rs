use std::env;

use chrono::Duration;
use log::*;
use mkt_common::{helpers::env_or_default, helpers::parse_boolean_flag, Percent, Secret, CURRENCY_CODE};

use crate::pricing::{
    PricingConfig,
    DEFAULT_AUCTION_DEPOSIT_PERCENT,
    DEFAULT_DEPOSIT_PERCENT,
    DEFAULT_RENTAL_MONTHS_UPFRONT,
};

const DEFAULT_CANCEL_WINDOW_HOURS: i64 = 24;
const DEFAULT_SUCCESS_URL: &str = "http://localhost:8080/checkout/success?session_id={CHECKOUT_SESSION_ID}";
const DEFAULT_CANCEL_URL: &str = "http://localhost:8080/checkout/cancel";
const DEFAULT_DATABASE_URL: &str = "sqlite://data/marketplace_settlement.db";

#[derive(Clone, Debug)]
pub struct SettlementConfig {
    pub pricing: PricingConfig,
    /// Reserved for seller payouts. The settlement math does not use it.
    pub platform_fee_percent: Percent,
    /// ISO currency code sent to the gateway. There is exactly one currency.
    pub currency: String,
    /// How long after an order is placed the buyer may still cancel it.
    pub cancel_window: Duration,
    /// Where the gateway sends the buyer after paying. `{CHECKOUT_SESSION_ID}` is replaced by the gateway.
    pub success_url: String,
    pub cancel_url: String,
    /// Key for the payment intent HMAC. Never empty: without a configured key, a random one is used.
    pub intent_secret: Secret<String>,
    /// If true, payments captured for orders that could not be created are refunded automatically.
    pub auto_refund: bool,
    /// Used by [`crate::SqliteDatabase::new_from_config`].
    pub database_url: String,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            pricing: PricingConfig::default(),
            platform_fee_percent: Percent::default(),
            currency: CURRENCY_CODE.to_string(),
            cancel_window: Duration::hours(DEFAULT_CANCEL_WINDOW_HOURS),
            success_url: DEFAULT_SUCCESS_URL.to_string(),
            cancel_url: DEFAULT_CANCEL_URL.to_string(),
            intent_secret: random_intent_secret(),
            auto_refund: true,
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl SettlementConfig {
    pub fn from_env_or_default() -> Self {
        let pricing = PricingConfig {
            deposit_percent: env_or_default("MPS_DEPOSIT_PERCENT", DEFAULT_DEPOSIT_PERCENT),
            auction_deposit_percent: env_or_default("MPS_AUCTION_DEPOSIT_PERCENT", DEFAULT_AUCTION_DEPOSIT_PERCENT),
            rental_months_upfront: env_or_default("MPS_RENTAL_MONTHS_UPFRONT", DEFAULT_RENTAL_MONTHS_UPFRONT),
        };
        if !pricing.auction_deposit_percent.is_positive() {
            warn!(
                "🪛️ MPS_AUCTION_DEPOSIT_PERCENT is {}. Auction deposits will use {} instead.",
                pricing.auction_deposit_percent,
                pricing.effective_auction_deposit_percent()
            );
        }
        let platform_fee_percent = env_or_default("MPS_PLATFORM_FEE_PERCENT", Percent::default());
        let currency = env_or_default("MPS_CURRENCY", CURRENCY_CODE.to_string()).to_lowercase();
        let cancel_window = Duration::hours(env_or_default("MPS_CANCEL_WINDOW_HOURS", DEFAULT_CANCEL_WINDOW_HOURS));
        let success_url = env_or_default("MPS_SUCCESS_URL", DEFAULT_SUCCESS_URL.to_string());
        let cancel_url = env_or_default("MPS_CANCEL_URL", DEFAULT_CANCEL_URL.to_string());
        let intent_secret = match env::var("MPS_INTENT_SECRET") {
            Ok(s) if !s.trim().is_empty() => Secret::new(s),
            _ => {
                error!(
                    "🪛️ MPS_INTENT_SECRET is not set. Payment intents will be signed with a random key, and checkout \
                     sessions opened before a restart cannot be confirmed afterwards."
                );
                random_intent_secret()
            },
        };
        let auto_refund = parse_boolean_flag(env::var("MPS_AUTO_REFUND").ok(), true);
        let database_url = env_or_default("MPS_DATABASE_URL", DEFAULT_DATABASE_URL.to_string());
        Self {
            pricing,
            platform_fee_percent,
            currency,
            cancel_window,
            success_url,
            cancel_url,
            intent_secret,
            auto_refund,
            database_url,
        }
    }

    /// Sets the intent HMAC key. An empty key is ignored and the current one kept.
    pub fn with_intent_secret<S: Into<String>>(mut self, secret: S) -> Self {
        let secret = secret.into();
        if secret.trim().is_empty() {
            warn!("🪛️ Ignoring an empty payment intent secret");
            return self;
        }
        self.intent_secret = Secret::new(secret);
        self
    }

    pub fn with_database_url<S: Into<String>>(mut self, url: S) -> Self {
        self.database_url = url.into();
        self
    }
}

fn random_intent_secret() -> Secret<String> {
    Secret::new(format!("{:032x}", rand::random::<u128>()))
}

#[cfg(test)]
mod test {
    use mkt_common::Money;

    use super::*;

    #[test]
    fn defaults() {
        let config = SettlementConfig::default();
        assert_eq!(config.pricing.deposit_percent, "0.10".parse().unwrap());
        assert_eq!(config.pricing.auction_deposit_percent, "0.20".parse().unwrap());
        assert_eq!(config.pricing.rental_months_upfront, 3);
        assert_eq!(config.cancel_window, Duration::hours(24));
        assert!(config.auto_refund);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        let deposit = Money::from_major_units(100).percent_of(config.pricing.deposit_percent);
        assert_eq!(deposit, Money::from_major_units(10));
    }

    #[test]
    fn default_intent_secret_is_random() {
        let a = SettlementConfig::default();
        let b = SettlementConfig::default();
        assert_eq!(a.intent_secret.reveal().len(), 32);
        assert_ne!(a.intent_secret.reveal(), b.intent_secret.reveal());
        let kept = a.clone().with_intent_secret("  ");
        assert_eq!(kept.intent_secret.reveal(), a.intent_secret.reveal());
        assert_eq!(a.with_intent_secret("k3y").intent_secret.reveal(), "k3y");
    }

    #[test]
    fn from_env() {
        env::set_var("MPS_DEPOSIT_PERCENT", "0.25");
        env::set_var("MPS_AUCTION_DEPOSIT_PERCENT", "0");
        env::set_var("MPS_RENTAL_MONTHS_UPFRONT", "not a number");
        env::set_var("MPS_CURRENCY", "EUR");
        env::set_var("MPS_AUTO_REFUND", "false");
        env::set_var("MPS_INTENT_SECRET", "s3cr3t");
        env::set_var("MPS_DATABASE_URL", "sqlite://data/other.db");
        let config = SettlementConfig::from_env_or_default();
        assert_eq!(config.pricing.deposit_percent, Percent::from_basis_points(2_500));
        assert_eq!(config.pricing.effective_auction_deposit_percent(), Percent::from_basis_points(3_000));
        assert_eq!(config.pricing.rental_months_upfront, 3);
        assert_eq!(config.currency, "eur");
        assert!(!config.auto_refund);
        assert_eq!(config.intent_secret.reveal(), "s3cr3t");
        assert_eq!(config.database_url, "sqlite://data/other.db");
    }
}
