//! Identifiers derived from the client order key.
//!
//! The client order key is minted once per quote and is the idempotency key for everything that happens to that
//! purchase afterwards: the wallet debit, the order row, refunds and holds.

/// A fresh, single-use client order key: 128 random bits as 32 lowercase hex characters.
pub fn new_client_order_key() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// The synthetic provider payment id for orders paid entirely from the wallet.
pub fn wallet_payment_id(client_order_key: &str) -> String {
    format!("WALLET-{client_order_key}")
}

pub fn refund_key(client_order_key: &str) -> String {
    format!("refund:{client_order_key}")
}

pub fn hold_key(client_order_key: &str) -> String {
    format!("hold:{client_order_key}")
}

pub fn release_key(client_order_key: &str) -> String {
    format!("release:{client_order_key}")
}

/// The idempotency key sent to the gateway when refunding a reconciliation item. Retries of the same item reuse it, so
/// the gateway refunds the payment at most once.
pub fn gateway_refund_key(reconciliation_item_id: i64) -> String {
    format!("reconciliation:{reconciliation_item_id}")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn client_order_keys_are_unique_hex() {
        let a = new_client_order_key();
        let b = new_client_order_key();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert_eq!(wallet_payment_id("abc"), "WALLET-abc");
        assert_eq!(refund_key("abc"), "refund:abc");
        assert_eq!(gateway_refund_key(7), "reconciliation:7");
    }
}
