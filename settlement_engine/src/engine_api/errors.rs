use mkt_common::Money;
use thiserror::Error;

use crate::{
    bidding::BidRejection,
    db::traits::{MaterializeRejection, SettlementDbError, WalletLedgerError},
    db_types::{OrderStatusType, ProductKind, ReconciliationReason},
    gateway::GatewayError,
    helpers::IntentError,
    pricing::PricingError,
};

/// Problems with a request that are detected before any money moves. Nothing is written when these occur.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Quantity must be positive, but {0} was requested")]
    InvalidQuantity(i64),
    #[error("Invalid pricing: {0}")]
    InvalidPricing(String),
    #[error("{0} listing #{1} does not exist")]
    ListingNotFound(ProductKind, i64),
    #[error("Listing #{0} is not available")]
    ListingUnavailable(i64),
    #[error("Listing #{listing_id} has {available} units left, but {requested} were requested")]
    OutOfStock { listing_id: i64, requested: i64, available: i64 },
    #[error("Sellers cannot buy their own listings")]
    SelfOrderForbidden,
    #[error("Sellers cannot bid on their own auctions")]
    SelfBidForbidden,
    #[error("The auction for listing #{0} is not open")]
    AuctionNotOpen(i64),
    #[error("A bid of {bid} is too low. It must exceed the top bid of {top_bid:?} or be at least {start_price}")]
    BidTooLow { bid: Money, top_bid: Option<Money>, start_price: Money },
    #[error("Only the buyer may do that with order #{0}")]
    NotOrderOwner(i64),
}

impl From<PricingError> for ValidationError {
    fn from(e: PricingError) -> Self {
        match e {
            PricingError::InvalidQuantity(q) => Self::InvalidQuantity(q),
            PricingError::InvalidPricing(s) => Self::InvalidPricing(s),
        }
    }
}

impl From<BidRejection> for ValidationError {
    fn from(e: BidRejection) -> Self {
        match e {
            BidRejection::AuctionNotOpen(id) => Self::AuctionNotOpen(id),
            BidRejection::SelfBidForbidden => Self::SelfBidForbidden,
            BidRejection::BidTooLow { bid, top_bid, start_price } => Self::BidTooLow { bid, top_bid, start_price },
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Invalid request. {0}")]
    Validation(#[from] ValidationError),
    #[error("Insufficient wallet funds. {available} is available, but {requested} was requested")]
    InsufficientFunds { available: Money, requested: Money },
    #[error("Payment for checkout session {0} has not been completed")]
    PaymentNotCompleted(String),
    #[error("The payment for checkout session {session_id} does not match the order. {reason}")]
    PaymentAmountMismatch { session_id: String, reason: String },
    #[error("The bid on listing #{listing_id} was superseded by a bid of {top_bid}")]
    BidSuperseded { listing_id: i64, top_bid: Money },
    #[error("Listing #{listing_id} sold out before the order could be placed ({available} left)")]
    OutOfStock { listing_id: i64, available: i64 },
    #[error("Listing #{0} was taken before the order could be placed")]
    ListingUnavailable(i64),
    #[error("The auction for listing #{0} closed before the bid could be placed")]
    AuctionClosed(i64),
    #[error("This payment could not be settled earlier and was handed to reconciliation item #{item_id} ({reason})")]
    PaymentAlreadyReconciled { item_id: i64, reason: ReconciliationReason },
    #[error("Order #{0} does not exist")]
    OrderNotFound(i64),
    #[error("Order #{0} can no longer be cancelled")]
    CancellationWindowClosed(i64),
    #[error("Cannot change order status from {from} to {to}")]
    OrderModificationForbidden { from: OrderStatusType, to: OrderStatusType },
    #[error("Order #{0} already has that status")]
    OrderModificationNoOp(i64),
    #[error("Order #{0} was modified by someone else. Reload it and try again")]
    ConcurrentModification(i64),
    #[error("Reconciliation item #{0} does not exist")]
    ReconciliationItemNotFound(i64),
    #[error("Payment gateway error. {0}")]
    Gateway(#[from] GatewayError),
    #[error("Wallet error. {0}")]
    Wallet(String),
    #[error("Payment intent error. {0}")]
    Intent(#[from] IntentError),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl SettlementError {
    /// Why a captured payment would need reconciliation if this error stopped its order from being created.
    ///
    /// Transient failures (database, gateway) return `None`. The confirmation can simply be retried.
    pub fn reconciliation_reason(&self) -> Option<ReconciliationReason> {
        match self {
            Self::PaymentAmountMismatch { .. } | Self::Intent(_) => Some(ReconciliationReason::PaymentAmountMismatch),
            Self::BidSuperseded { .. } => Some(ReconciliationReason::BidSuperseded),
            Self::OutOfStock { .. } => Some(ReconciliationReason::OutOfStock),
            Self::AuctionClosed(_) => Some(ReconciliationReason::AuctionClosed),
            Self::PaymentAlreadyReconciled { reason, .. } => Some(*reason),
            Self::ListingUnavailable(_) | Self::Validation(_) => Some(ReconciliationReason::ListingUnavailable),
            Self::InsufficientFunds { .. } | Self::Wallet(_) => Some(ReconciliationReason::InsufficientWalletFunds),
            _ => None,
        }
    }

    /// Failures that can happen after the gateway has captured the buyer's money, and so need reconciliation.
    pub fn is_post_payment_failure(&self) -> bool {
        self.reconciliation_reason().is_some()
    }

    pub(crate) fn from_rejection(listing_id: i64, rejection: MaterializeRejection) -> Self {
        match rejection {
            MaterializeRejection::OutOfStock { available } => Self::OutOfStock { listing_id, available },
            MaterializeRejection::ListingUnavailable => Self::ListingUnavailable(listing_id),
            MaterializeRejection::AuctionClosed => Self::AuctionClosed(listing_id),
            MaterializeRejection::BidSuperseded { top_bid } => Self::BidSuperseded { listing_id, top_bid },
            MaterializeRejection::SelfOrderForbidden => Self::Validation(ValidationError::SelfOrderForbidden),
            MaterializeRejection::AlreadyReconciled { item_id, reason } => {
                Self::PaymentAlreadyReconciled { item_id, reason }
            },
        }
    }
}

impl From<WalletLedgerError> for SettlementError {
    fn from(e: WalletLedgerError) -> Self {
        match e {
            WalletLedgerError::InsufficientFunds { available, requested } => {
                Self::InsufficientFunds { available, requested }
            },
            WalletLedgerError::DatabaseError(s) => Self::DatabaseError(s),
            e => Self::Wallet(e.to_string()),
        }
    }
}

impl From<SettlementDbError> for SettlementError {
    fn from(e: SettlementDbError) -> Self {
        match e {
            SettlementDbError::DatabaseError(s) => Self::DatabaseError(s),
            SettlementDbError::ListingNotFound(kind, id) => {
                Self::Validation(ValidationError::ListingNotFound(kind, id))
            },
            SettlementDbError::OrderNotFound(id) => Self::OrderNotFound(id),
            SettlementDbError::ReconciliationItemNotFound(id) => Self::ReconciliationItemNotFound(id),
            // Callers that know the listing map rejections themselves
            SettlementDbError::Rejected(r) => Self::from_rejection(0, r),
            SettlementDbError::OrderNotCancellable(_, status) => {
                Self::OrderModificationForbidden { from: status, to: OrderStatusType::Cancelled }
            },
            SettlementDbError::OrderStatusChanged { id, .. } => Self::ConcurrentModification(id),
            SettlementDbError::Ledger(e) => e.into(),
        }
    }
}

/// Errors from the wallet API.
#[derive(Debug, Clone, Error)]
pub enum WalletApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Insufficient wallet funds. {available} is available, but {requested} was requested")]
    InsufficientFunds { available: Money, requested: Money },
    #[error("Wallet amounts must be positive, but got {0}")]
    InvalidAmount(Money),
    #[error("Wallet transaction conflict: {0}")]
    Conflict(String),
}

impl From<WalletLedgerError> for WalletApiError {
    fn from(e: WalletLedgerError) -> Self {
        match e {
            WalletLedgerError::DatabaseError(s) => Self::DatabaseError(s),
            WalletLedgerError::InsufficientFunds { available, requested } => {
                Self::InsufficientFunds { available, requested }
            },
            WalletLedgerError::InvalidAmount(m) => Self::InvalidAmount(m),
            e => Self::Conflict(e.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn post_payment_failures() {
        let e = SettlementError::from_rejection(3, MaterializeRejection::OutOfStock { available: 0 });
        assert!(e.is_post_payment_failure());
        assert_eq!(e.reconciliation_reason(), Some(ReconciliationReason::OutOfStock));
        let e = SettlementError::from_rejection(3, MaterializeRejection::AlreadyReconciled {
            item_id: 9,
            reason: ReconciliationReason::BidSuperseded,
        });
        assert_eq!(e.reconciliation_reason(), Some(ReconciliationReason::BidSuperseded));
        assert!(!SettlementError::DatabaseError("locked".into()).is_post_payment_failure());
        assert!(!SettlementError::Gateway(GatewayError::Unavailable("timeout".into())).is_post_payment_failure());
    }
}
