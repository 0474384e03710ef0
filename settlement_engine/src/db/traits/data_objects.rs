use mkt_common::Money;
use thiserror::Error;

use crate::db_types::{Order, ReconciliationItem, ReconciliationReason, WalletTransaction};

/// The result of materializing a paid checkout into an order.
#[derive(Debug, Clone)]
pub enum MaterializeOutcome {
    /// A new order was created. For auction bids, `outbid` is the previous top bid, if there was one.
    Inserted { order: Order, outbid: Option<Order> },
    /// An order already exists for the client order key. Nothing was changed.
    AlreadyExists(Order),
}

impl MaterializeOutcome {
    pub fn order(&self) -> &Order {
        match self {
            Self::Inserted { order, .. } => order,
            Self::AlreadyExists(order) => order,
        }
    }

    pub fn already_processed(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

/// Why a paid checkout could not be turned into an order, as determined under the listing lock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaterializeRejection {
    #[error("Only {available} units remain")]
    OutOfStock { available: i64 },
    #[error("The listing is not available")]
    ListingUnavailable,
    #[error("The auction is closed")]
    AuctionClosed,
    #[error("The bid was superseded by a bid of {top_bid}")]
    BidSuperseded { top_bid: Money },
    #[error("Sellers cannot buy their own listings")]
    SelfOrderForbidden,
    #[error("The payment was already handed to reconciliation item #{item_id} ({reason})")]
    AlreadyReconciled { item_id: i64, reason: ReconciliationReason },
}

#[derive(Debug, Clone)]
pub struct CancelledOrder {
    pub order: Order,
    /// The wallet refund of the wallet-funded portion, if there was one.
    pub wallet_refund: Option<WalletTransaction>,
    /// The release of a wallet hold tied to the order, if there was one.
    pub released_hold: Option<WalletTransaction>,
}

#[derive(Debug, Clone)]
pub enum InsertReconciliationResult {
    Inserted(ReconciliationItem),
    AlreadyExists(ReconciliationItem),
}

impl InsertReconciliationResult {
    pub fn item(&self) -> &ReconciliationItem {
        match self {
            Self::Inserted(item) => item,
            Self::AlreadyExists(item) => item,
        }
    }

    pub fn into_item(self) -> ReconciliationItem {
        match self {
            Self::Inserted(item) => item,
            Self::AlreadyExists(item) => item,
        }
    }
}

/// The result of trying to take an open reconciliation item for a refund.
#[derive(Debug, Clone)]
pub enum RefundClaim {
    /// The item is now `Refunding` and belongs to the caller.
    Claimed(ReconciliationItem),
    /// An order exists for the payment after all, so the item was resolved without a refund.
    Settled { item: ReconciliationItem, order: Order },
    /// The item is not open: another caller is refunding it, or it is already closed.
    Unavailable(ReconciliationItem),
}
