use log::trace;
use mkt_common::Money;
use serde::{Deserialize, Serialize};

/// How the buyer asked to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaymentMode {
    /// Everything goes through the card gateway.
    #[default]
    GatewayOnly,
    /// Use wallet funds first, and the gateway for the rest.
    Split,
}

/// The authoritative division of the amount due now between the wallet and the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSplit {
    pub wallet_amount: Money,
    pub gateway_amount: Money,
}

impl PaymentSplit {
    pub fn total(&self) -> Money {
        self.wallet_amount + self.gateway_amount
    }

    /// Nothing is left for the gateway, so the order can be settled immediately.
    pub fn is_wallet_only(&self) -> bool {
        !self.gateway_amount.is_positive()
    }
}

/// Splits `required` between the wallet and the gateway.
///
/// In split mode the wallet covers as much as the buyer asked for, limited by what is `available` and by `required`
/// itself. The gateway covers the remainder, so `wallet_amount + gateway_amount == required` always holds.
pub fn plan(required: Money, requested_wallet: Money, mode: PaymentMode, available: Money) -> PaymentSplit {
    let required = required.non_negative();
    let split = match mode {
        PaymentMode::GatewayOnly => PaymentSplit { wallet_amount: Money::ZERO, gateway_amount: required },
        PaymentMode::Split => {
            let wallet_amount = requested_wallet.min(available).min(required).non_negative();
            let gateway_amount = (required - wallet_amount).non_negative();
            PaymentSplit { wallet_amount, gateway_amount }
        },
    };
    trace!(
        "🧾️ Planned split for {required}: wallet {}, gateway {}",
        split.wallet_amount,
        split.gateway_amount
    );
    split
}
