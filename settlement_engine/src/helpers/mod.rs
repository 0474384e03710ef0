mod keys;
mod payment_intent;

pub use keys::{gateway_refund_key, hold_key, new_client_order_key, refund_key, release_key, wallet_payment_id};
pub use payment_intent::{IntentError, IntentSigner, Metadata, PaymentIntent, INTENT_KEYS, INTENT_MAC_KEY};
