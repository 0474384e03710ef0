use chrono::{DateTime, Utc};
use mkt_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, ProductKind},
    split_planner::PaymentMode,
};

/// Who is asking, and when. Passed explicitly into every engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub buyer_id: i64,
    pub now: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(buyer_id: i64) -> Self {
        Self { buyer_id, now: Utc::now() }
    }

    pub fn at(buyer_id: i64, now: DateTime<Utc>) -> Self {
        Self { buyer_id, now }
    }
}

/// What the buyer wants to pay for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseTarget {
    Material { listing_id: i64, quantity: i64 },
    Machine { listing_id: i64, quantity: i64 },
    Rental { listing_id: i64 },
    AuctionBid { listing_id: i64, bid_amount: Money },
}

impl PurchaseTarget {
    pub fn kind(&self) -> ProductKind {
        match self {
            Self::Material { .. } => ProductKind::Material,
            Self::Machine { .. } => ProductKind::Machine,
            Self::Rental { .. } => ProductKind::Rental,
            Self::AuctionBid { .. } => ProductKind::AuctionBid,
        }
    }

    pub fn listing_id(&self) -> i64 {
        match self {
            Self::Material { listing_id, .. } |
            Self::Machine { listing_id, .. } |
            Self::Rental { listing_id } |
            Self::AuctionBid { listing_id, .. } => *listing_id,
        }
    }

    /// Rentals and bids are always for a single unit.
    pub fn quantity(&self) -> i64 {
        match self {
            Self::Material { quantity, .. } | Self::Machine { quantity, .. } => *quantity,
            Self::Rental { .. } | Self::AuctionBid { .. } => 1,
        }
    }

    pub fn bid_amount(&self) -> Option<Money> {
        match self {
            Self::AuctionBid { bid_amount, .. } => Some(*bid_amount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub target: PurchaseTarget,
    /// How much the buyer wants to pay now. Only materials and machines honour this; `None` means the deposit.
    pub pay_amount: Option<Money>,
    /// How much of the payment the buyer wants to take from their wallet. Only used in split mode.
    pub wallet_amount: Money,
    pub mode: PaymentMode,
}

impl QuoteRequest {
    pub fn new(target: PurchaseTarget) -> Self {
        Self { target, pay_amount: None, wallet_amount: Money::ZERO, mode: PaymentMode::GatewayOnly }
    }

    pub fn with_pay_amount(mut self, amount: Money) -> Self {
        self.pay_amount = Some(amount);
        self
    }

    /// Switches to split mode, taking up to `amount` from the wallet.
    pub fn with_wallet_amount(mut self, amount: Money) -> Self {
        self.wallet_amount = amount;
        self.mode = PaymentMode::Split;
        self
    }
}

/// The terms offered to the buyer, and where to go next.
///
/// If the wallet covers everything, the order is settled straight away and returned in `order`. Otherwise the buyer
/// must follow `redirect_url` to pay the gateway portion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub kind: ProductKind,
    pub listing_id: i64,
    pub total: Money,
    pub deposit_required: Money,
    pub pay_amount_total: Money,
    pub wallet_amount: Money,
    pub gateway_amount: Money,
    pub client_order_key: String,
    pub session_id: Option<String>,
    pub redirect_url: Option<String>,
    pub order: Option<Order>,
}

impl Quote {
    pub fn is_settled(&self) -> bool {
        self.order.is_some()
    }
}

/// The outcome of a successful confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedOrder {
    pub order: Order,
    /// True if the order had already been created by an earlier confirmation of the same checkout.
    pub already_processed: bool,
}

/// The flattened confirmation result handed back to controllers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub success: bool,
    pub order_id: Option<i64>,
    pub message: String,
}

impl From<ConfirmedOrder> for Confirmation {
    fn from(confirmed: ConfirmedOrder) -> Self {
        let message = if confirmed.already_processed {
            format!("Order #{} was already confirmed", confirmed.order.id)
        } else {
            format!("Order #{} has been placed", confirmed.order.id)
        };
        Self { success: true, order_id: Some(confirmed.order.id), message }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionResult {
    pub listing_id: i64,
    pub winning_bid: Option<Order>,
}
