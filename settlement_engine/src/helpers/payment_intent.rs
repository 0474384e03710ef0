//! # Payment intent encoding
//!
//! Nothing is persisted when a checkout session is opened. Everything the engine needs to turn a paid session into an
//! order travels with the session as a flat string map of metadata, and comes back when the session status is
//! fetched. Since that map passes through the gateway (and, for redirects, the buyer's browser is involved in
//! choosing which session to confirm), the intent is tagged with an HMAC so that the engine can tell if it was
//! altered.
//!
//! ## Format
//!
//! The intent uses exactly these keys:
//!
//! ```text
//!   user_id, target_kind, target_id, quantity, bid_amount, wallet_amount, gateway_amount,
//!   pay_amount_total, deposit_required, total, client_order_key
//! ```
//!
//! Amounts are decimal strings with two decimals (`"12.50"`). `bid_amount` is empty for anything but auction bids.
//!
//! The canonical message is one `key=value\n` line per key, in the order above. The tag is stored under
//! `intent_mac` and is `base64(HMAC-SHA256(secret, canonical_message))`.
use std::collections::HashMap;

use hmac::{Hmac, Mac};
use mkt_common::{Money, Secret};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::db_types::ProductKind;

pub type Metadata = HashMap<String, String>;

type HmacSha256 = Hmac<Sha256>;

pub const INTENT_MAC_KEY: &str = "intent_mac";
pub const INTENT_KEYS: [&str; 11] = [
    "user_id",
    "target_kind",
    "target_id",
    "quantity",
    "bid_amount",
    "wallet_amount",
    "gateway_amount",
    "pay_amount_total",
    "deposit_required",
    "total",
    "client_order_key",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    #[error("The payment intent is missing the '{0}' field")]
    MissingField(String),
    #[error("The payment intent field '{key}' has an invalid value: '{value}'")]
    InvalidField { key: String, value: String },
    #[error("The payment intent signature is invalid")]
    InvalidSignature,
    #[error("The intent signing key is unusable: {0}")]
    InvalidKey(String),
}

/// The terms of a purchase, as agreed at quote time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub user_id: i64,
    pub target_kind: ProductKind,
    pub target_id: i64,
    pub quantity: i64,
    pub bid_amount: Option<Money>,
    pub wallet_amount: Money,
    pub gateway_amount: Money,
    pub pay_amount_total: Money,
    pub deposit_required: Money,
    pub total: Money,
    pub client_order_key: String,
}

impl PaymentIntent {
    fn fields(&self) -> [String; 11] {
        [
            self.user_id.to_string(),
            self.target_kind.to_string(),
            self.target_id.to_string(),
            self.quantity.to_string(),
            self.bid_amount.map(|b| b.to_string()).unwrap_or_default(),
            self.wallet_amount.to_string(),
            self.gateway_amount.to_string(),
            self.pay_amount_total.to_string(),
            self.deposit_required.to_string(),
            self.total.to_string(),
            self.client_order_key.clone(),
        ]
    }

    /// Encodes the intent as signed session metadata.
    pub fn to_metadata(&self, signer: &IntentSigner) -> Result<Metadata, IntentError> {
        let mut metadata: Metadata =
            INTENT_KEYS.iter().zip(self.fields()).map(|(k, v)| (k.to_string(), v)).collect();
        let tag = signer.sign(&canonical_message(&metadata)?)?;
        metadata.insert(INTENT_MAC_KEY.to_string(), tag);
        Ok(metadata)
    }

    /// Decodes and verifies signed session metadata. Extra keys are ignored.
    pub fn from_metadata(metadata: &Metadata, signer: &IntentSigner) -> Result<Self, IntentError> {
        let message = canonical_message(metadata)?;
        let tag = metadata.get(INTENT_MAC_KEY).ok_or_else(|| IntentError::MissingField(INTENT_MAC_KEY.into()))?;
        signer.verify(&message, tag)?;
        let bid_amount = match field(metadata, "bid_amount")? {
            "" => None,
            _ => Some(parse(metadata, "bid_amount")?),
        };
        Ok(Self {
            user_id: parse(metadata, "user_id")?,
            target_kind: parse(metadata, "target_kind")?,
            target_id: parse(metadata, "target_id")?,
            quantity: parse(metadata, "quantity")?,
            bid_amount,
            wallet_amount: parse(metadata, "wallet_amount")?,
            gateway_amount: parse(metadata, "gateway_amount")?,
            pay_amount_total: parse(metadata, "pay_amount_total")?,
            deposit_required: parse(metadata, "deposit_required")?,
            total: parse(metadata, "total")?,
            client_order_key: field(metadata, "client_order_key")?.to_string(),
        })
    }
}

fn field<'a>(metadata: &'a Metadata, key: &str) -> Result<&'a str, IntentError> {
    metadata.get(key).map(String::as_str).ok_or_else(|| IntentError::MissingField(key.into()))
}

fn parse<T: std::str::FromStr>(metadata: &Metadata, key: &str) -> Result<T, IntentError> {
    let value = field(metadata, key)?;
    value.parse().map_err(|_| IntentError::InvalidField { key: key.into(), value: value.into() })
}

fn canonical_message(metadata: &Metadata) -> Result<String, IntentError> {
    INTENT_KEYS.iter().try_fold(String::new(), |mut message, key| {
        let value = field(metadata, key)?;
        message.push_str(key);
        message.push('=');
        message.push_str(value);
        message.push('\n');
        Ok(message)
    })
}

/// Signs and verifies payment intents with a shared secret.
#[derive(Debug, Clone)]
pub struct IntentSigner {
    key: Secret<String>,
}

impl IntentSigner {
    pub fn new(key: Secret<String>) -> Self {
        Self { key }
    }

    fn mac(&self) -> Result<HmacSha256, IntentError> {
        HmacSha256::new_from_slice(self.key.reveal().as_bytes()).map_err(|e| IntentError::InvalidKey(e.to_string()))
    }

    pub fn sign(&self, message: &str) -> Result<String, IntentError> {
        let mut mac = self.mac()?;
        mac.update(message.as_bytes());
        Ok(base64::encode(mac.finalize().into_bytes()))
    }

    /// Checks the tag in constant time.
    pub fn verify(&self, message: &str, tag: &str) -> Result<(), IntentError> {
        let tag = base64::decode(tag).map_err(|_| IntentError::InvalidSignature)?;
        let mut mac = self.mac()?;
        mac.update(message.as_bytes());
        mac.verify_slice(&tag).map_err(|_| IntentError::InvalidSignature)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn signer() -> IntentSigner {
        IntentSigner::new(Secret::new("intent-test-secret".to_string()))
    }

    fn intent() -> PaymentIntent {
        PaymentIntent {
            user_id: 42,
            target_kind: ProductKind::Material,
            target_id: 7,
            quantity: 5,
            bid_amount: None,
            wallet_amount: "15.00".parse().unwrap(),
            gateway_amount: "25.00".parse().unwrap(),
            pay_amount_total: "40.00".parse().unwrap(),
            deposit_required: "10.00".parse().unwrap(),
            total: "100.00".parse().unwrap(),
            client_order_key: "0123456789abcdef0123456789abcdef".into(),
        }
    }

    #[test]
    fn metadata_uses_the_fixed_key_set() {
        let metadata = intent().to_metadata(&signer()).unwrap();
        assert_eq!(metadata.len(), INTENT_KEYS.len() + 1);
        assert_eq!(metadata["deposit_required"], "10.00");
        assert_eq!(metadata["target_kind"], "Material");
        assert_eq!(metadata["bid_amount"], "");
        assert!(!metadata.contains_key("Deposit"));
        let decoded = PaymentIntent::from_metadata(&metadata, &signer()).unwrap();
        assert_eq!(decoded, intent());
    }

    #[test]
    fn auction_bids_carry_the_bid_amount() {
        let mut bid = intent();
        bid.target_kind = ProductKind::AuctionBid;
        bid.bid_amount = Some("60.00".parse().unwrap());
        let metadata = bid.to_metadata(&signer()).unwrap();
        assert_eq!(metadata["bid_amount"], "60.00");
        assert_eq!(PaymentIntent::from_metadata(&metadata, &signer()).unwrap(), bid);
    }

    #[test]
    fn tampering_is_detected() {
        let mut metadata = intent().to_metadata(&signer()).unwrap();
        metadata.insert("gateway_amount".into(), "0.01".into());
        assert_eq!(PaymentIntent::from_metadata(&metadata, &signer()), Err(IntentError::InvalidSignature));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let metadata = intent().to_metadata(&signer()).unwrap();
        let other = IntentSigner::new(Secret::new("another-secret".to_string()));
        assert_eq!(PaymentIntent::from_metadata(&metadata, &other), Err(IntentError::InvalidSignature));
    }

    #[test]
    fn missing_fields_are_rejected() {
        let mut metadata = intent().to_metadata(&signer()).unwrap();
        metadata.remove("total");
        assert_eq!(PaymentIntent::from_metadata(&metadata, &signer()), Err(IntentError::MissingField("total".into())));
        let mut metadata = intent().to_metadata(&signer()).unwrap();
        metadata.remove(INTENT_MAC_KEY);
        assert_eq!(
            PaymentIntent::from_metadata(&metadata, &signer()),
            Err(IntentError::MissingField(INTENT_MAC_KEY.into()))
        );
        let mut metadata = intent().to_metadata(&signer()).unwrap();
        metadata.insert(INTENT_MAC_KEY.into(), "not base64!".into());
        assert_eq!(PaymentIntent::from_metadata(&metadata, &signer()), Err(IntentError::InvalidSignature));
    }
}
