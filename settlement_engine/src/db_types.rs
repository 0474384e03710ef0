use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use mkt_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------     ProductKind       ---------------------------------------------------------
/// The four kinds of thing a buyer can pay for. Each kind has its own pricing policy, but all of them settle through
/// the same engine and land in the same `orders` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum ProductKind {
    Material,
    Machine,
    Rental,
    AuctionBid,
}

impl ProductKind {
    /// Material and machine listings are sold from a finite stock.
    pub fn is_stocked(&self) -> bool {
        matches!(self, Self::Material | Self::Machine)
    }
}

impl Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductKind::Material => write!(f, "Material"),
            ProductKind::Machine => write!(f, "Machine"),
            ProductKind::Rental => write!(f, "Rental"),
            ProductKind::AuctionBid => write!(f, "AuctionBid"),
        }
    }
}

impl FromStr for ProductKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Material" => Ok(Self::Material),
            "Machine" => Ok(Self::Machine),
            "Rental" => Ok(Self::Rental),
            "AuctionBid" => Ok(Self::AuctionBid),
            s => Err(ConversionError(format!("Invalid product kind: {s}"))),
        }
    }
}

//--------------------------------------    ListingStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ListingStatus {
    Available,
    /// A rental that has been booked.
    Reserved,
    Closed,
}

impl Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingStatus::Available => write!(f, "Available"),
            ListingStatus::Reserved => write!(f, "Reserved"),
            ListingStatus::Closed => write!(f, "Closed"),
        }
    }
}

//--------------------------------------       Listing         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Listing {
    pub id: i64,
    pub kind: ProductKind,
    pub owner_id: i64,
    pub title: String,
    /// Unit price for materials and machines, the monthly price for rentals. Unused for auctions.
    pub price: Money,
    pub stock: i64,
    pub status: ListingStatus,
    pub start_price: Option<Money>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub lock_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewListing {
    pub kind: ProductKind,
    pub owner_id: i64,
    pub title: String,
    pub price: Money,
    pub stock: i64,
    pub start_price: Option<Money>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl NewListing {
    pub fn new<S: Into<String>>(kind: ProductKind, owner_id: i64, title: S, price: Money, stock: i64) -> Self {
        Self { kind, owner_id, title: title.into(), price, stock, start_price: None, start_date: None, end_date: None }
    }

    pub fn auction<S: Into<String>>(
        owner_id: i64,
        title: S,
        start_price: Money,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: ProductKind::AuctionBid,
            owner_id,
            title: title.into(),
            price: start_price,
            stock: 1,
            start_price: Some(start_price),
            start_date: Some(start_date),
            end_date: Some(end_date),
        }
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The payment has been captured and the order recorded. Awaiting seller confirmation.
    Pending,
    /// The seller has accepted the order.
    Confirmed,
    Shipped,
    Completed,
    /// The order has been cancelled by the buyer or the seller.
    Cancelled,
    /// The buyer removed the order from their history.
    DeletedByBuyer,
    /// The seller removed the order from their history.
    DeletedBySeller,
}

impl OrderStatusType {
    /// Whether an auction order in this state still competes for the top bid.
    pub fn counts_as_bid(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::DeletedByBuyer | Self::DeletedBySeller)
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// The order lifecycle. Same-state changes are not transitions.
    pub fn can_transition_to(&self, new_status: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, new_status),
            (Pending, Confirmed) |
                (Pending, Cancelled) |
                (Confirmed, Shipped) |
                (Confirmed, Cancelled) |
                (Shipped, Completed) |
                (Completed, DeletedByBuyer) |
                (Completed, DeletedBySeller) |
                (Cancelled, DeletedByBuyer) |
                (Cancelled, DeletedBySeller)
        )
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Confirmed => write!(f, "Confirmed"),
            OrderStatusType::Shipped => write!(f, "Shipped"),
            OrderStatusType::Completed => write!(f, "Completed"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
            OrderStatusType::DeletedByBuyer => write!(f, "DeletedByBuyer"),
            OrderStatusType::DeletedBySeller => write!(f, "DeletedBySeller"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Confirmed" => Ok(Self::Confirmed),
            "Shipped" => Ok(Self::Shipped),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            "DeletedByBuyer" => Ok(Self::DeletedByBuyer),
            "DeletedBySeller" => Ok(Self::DeletedBySeller),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub kind: ProductKind,
    pub buyer_id: i64,
    pub seller_id: i64,
    pub listing_id: i64,
    pub status: OrderStatusType,
    pub quantity: i64,
    pub unit_price: Money,
    pub bid_amount: Option<Money>,
    pub total_price: Money,
    pub deposit_required: Money,
    pub amount_paid: Money,
    pub wallet_amount: Money,
    pub gateway_amount: Money,
    /// "Wallet" for wallet-only settlements, otherwise the gateway provider name
    pub provider: String,
    pub provider_payment_id: String,
    pub client_order_key: String,
    pub cancel_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// What is still owed to the seller after the amount paid at checkout.
    pub fn balance_due(&self) -> Money {
        (self.total_price - self.amount_paid).non_negative()
    }
}

//--------------------------------------       NewOrder        ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub kind: ProductKind,
    pub buyer_id: i64,
    pub listing_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    pub bid_amount: Option<Money>,
    pub total_price: Money,
    pub deposit_required: Money,
    pub amount_paid: Money,
    pub wallet_amount: Money,
    pub gateway_amount: Money,
    pub provider: String,
    pub provider_payment_id: String,
    pub client_order_key: String,
    pub cancel_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Wallet         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: i64,
    pub balance: Money,
    pub reserved: Money,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// An unpersisted, empty wallet for users that have never transacted.
    pub fn empty(user_id: i64) -> Self {
        let now = Utc::now();
        Self { user_id, balance: Money::ZERO, reserved: Money::ZERO, version: 0, created_at: now, updated_at: now }
    }

    pub fn available(&self) -> Money {
        (self.balance - self.reserved).non_negative()
    }

    pub fn balance(&self) -> WalletBalance {
        WalletBalance { available: self.available(), balance: self.balance, reserved: self.reserved }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub available: Money,
    pub balance: Money,
    pub reserved: Money,
}

//--------------------------------------   WalletTxType        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WalletTxType {
    Credit,
    Debit,
    Hold,
    Release,
    Refund,
    Adjustment,
}

impl Display for WalletTxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletTxType::Credit => write!(f, "Credit"),
            WalletTxType::Debit => write!(f, "Debit"),
            WalletTxType::Hold => write!(f, "Hold"),
            WalletTxType::Release => write!(f, "Release"),
            WalletTxType::Refund => write!(f, "Refund"),
            WalletTxType::Adjustment => write!(f, "Adjustment"),
        }
    }
}

//--------------------------------------   WalletTxStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WalletTxStatus {
    Pending,
    Succeeded,
    Failed,
    Reversed,
}

impl WalletTxStatus {
    pub fn can_transition_to(&self, new_status: WalletTxStatus) -> bool {
        use WalletTxStatus::*;
        matches!((self, new_status), (Pending, Succeeded) | (Pending, Failed) | (Succeeded, Reversed))
    }
}

impl Display for WalletTxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletTxStatus::Pending => write!(f, "Pending"),
            WalletTxStatus::Succeeded => write!(f, "Succeeded"),
            WalletTxStatus::Failed => write!(f, "Failed"),
            WalletTxStatus::Reversed => write!(f, "Reversed"),
        }
    }
}

//--------------------------------------  WalletTransaction    ---------------------------------------------------------
/// An append-only ledger entry. Only `status` ever changes after insertion.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: i64,
    pub user_id: i64,
    pub tx_type: WalletTxType,
    pub status: WalletTxStatus,
    pub amount: Money,
    pub balance_after: Money,
    pub reserved_after: Money,
    pub idempotency_key: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WalletMutation {
    pub user_id: i64,
    pub tx_type: WalletTxType,
    pub amount: Money,
    pub idempotency_key: String,
    pub note: Option<String>,
}

impl WalletMutation {
    pub fn new<S: Into<String>>(user_id: i64, tx_type: WalletTxType, amount: Money, idempotency_key: S) -> Self {
        Self { user_id, tx_type, amount, idempotency_key: idempotency_key.into(), note: None }
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.note = Some(note.into());
        self
    }

    /// A replayed mutation must match the recorded transaction exactly.
    pub fn matches(&self, tx: &WalletTransaction) -> bool {
        self.user_id == tx.user_id && self.tx_type == tx.tx_type && self.amount == tx.amount
    }
}

//-------------------------------------- ReconciliationReason  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ReconciliationReason {
    PaymentAmountMismatch,
    BidSuperseded,
    OutOfStock,
    AuctionClosed,
    ListingUnavailable,
    InsufficientWalletFunds,
    BuyerCancelled,
}

impl Display for ReconciliationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconciliationReason::PaymentAmountMismatch => write!(f, "PaymentAmountMismatch"),
            ReconciliationReason::BidSuperseded => write!(f, "BidSuperseded"),
            ReconciliationReason::OutOfStock => write!(f, "OutOfStock"),
            ReconciliationReason::AuctionClosed => write!(f, "AuctionClosed"),
            ReconciliationReason::ListingUnavailable => write!(f, "ListingUnavailable"),
            ReconciliationReason::InsufficientWalletFunds => write!(f, "InsufficientWalletFunds"),
            ReconciliationReason::BuyerCancelled => write!(f, "BuyerCancelled"),
        }
    }
}

//-------------------------------------- ReconciliationStatus  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ReconciliationStatus {
    Open,
    /// A refund is in flight. Only the caller that moved the item here may talk to the gateway about it.
    Refunding,
    Refunded,
    Resolved,
}

impl Display for ReconciliationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconciliationStatus::Open => write!(f, "Open"),
            ReconciliationStatus::Refunding => write!(f, "Refunding"),
            ReconciliationStatus::Refunded => write!(f, "Refunded"),
            ReconciliationStatus::Resolved => write!(f, "Resolved"),
        }
    }
}

//--------------------------------------  ReconciliationItem   ---------------------------------------------------------
/// Money that was captured by the gateway but could not be turned into an order (or was returned by a cancellation).
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ReconciliationItem {
    pub id: i64,
    /// The checkout session id, or `order:{id}` for cancellations
    pub session_id: String,
    pub client_order_key: Option<String>,
    pub user_id: Option<i64>,
    pub provider_payment_id: Option<String>,
    pub amount: Money,
    pub reason: ReconciliationReason,
    pub status: ReconciliationStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub refund_id: Option<String>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReconciliationItem {
    pub session_id: String,
    pub client_order_key: Option<String>,
    pub user_id: Option<i64>,
    pub provider_payment_id: Option<String>,
    pub amount: Money,
    pub reason: ReconciliationReason,
    pub note: Option<String>,
}
