use serde::{Deserialize, Serialize};

use crate::db_types::{Order, ReconciliationItem};

/// A new order was materialized from a paid checkout or a wallet-only settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmedEvent {
    pub order: Order,
}

impl OrderConfirmedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// A new top bid was placed on an auction. `outbid` is the bid it displaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidSupersededEvent {
    pub outbid: Order,
    pub new_top_bid: Order,
}

impl BidSupersededEvent {
    pub fn new(outbid: Order, new_top_bid: Order) -> Self {
        Self { outbid, new_top_bid }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order: Order,
}

impl OrderCancelledEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Captured money needs a refund or a human decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationRequiredEvent {
    pub item: ReconciliationItem,
}

impl ReconciliationRequiredEvent {
    pub fn new(item: ReconciliationItem) -> Self {
        Self { item }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    OrderConfirmed(OrderConfirmedEvent),
    BidSuperseded(BidSupersededEvent),
    OrderCancelled(OrderCancelledEvent),
    ReconciliationRequired(ReconciliationRequiredEvent),
}
