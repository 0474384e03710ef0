use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::{listings, new_pool, orders, reconciliation, wallets};
use crate::{
    bidding::{self, BidRejection},
    config::SettlementConfig,
    db::traits::{
        CancelledOrder,
        InsertReconciliationResult,
        ListingManagement,
        MaterializeOutcome,
        MaterializeRejection,
        OrderManagement,
        ReconciliationManagement,
        RefundClaim,
        SettlementDatabase,
        SettlementDbError,
        WalletLedger,
        WalletLedgerError,
    },
    db_types::{
        Listing,
        ListingStatus,
        NewListing,
        NewOrder,
        NewReconciliationItem,
        Order,
        OrderStatusType,
        ProductKind,
        ReconciliationItem,
        ReconciliationReason,
        Wallet,
        WalletMutation,
        WalletTransaction,
        WalletTxStatus,
        WalletTxType,
    },
    helpers::{hold_key, refund_key, release_key},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the configured database URL (`MPS_DATABASE_URL`).
    pub async fn new_from_config(config: &SettlementConfig, max_connections: u32) -> Result<Self, sqlx::Error> {
        info!("🗃️ Using database URL: {}", config.database_url);
        SqliteDatabase::new_with_url(&config.database_url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Runs the embedded migrations against the database.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn materialize_order(
        &self,
        order: NewOrder,
        now: DateTime<Utc>,
    ) -> Result<MaterializeOutcome, SettlementDbError> {
        let mut tx = self.pool.begin().await?;
        listings::lock_listing(order.kind, order.listing_id, &mut tx).await?;
        if let Some(existing) = orders::fetch_order_by_client_key(&order.client_order_key, &mut tx).await? {
            debug!("🗃️ Order for {} already exists as #{}. Nothing to do.", order.client_order_key, existing.id);
            return Ok(MaterializeOutcome::AlreadyExists(existing));
        }
        if let Some(item) = reconciliation::fetch_for_client_key(&order.client_order_key, &mut tx).await? {
            debug!(
                "🗃️ Payment for {} is already reconciliation item #{} ({}). No order will be created.",
                order.client_order_key, item.id, item.status
            );
            return Err(MaterializeRejection::AlreadyReconciled { item_id: item.id, reason: item.reason }.into());
        }
        let listing = listings::fetch_listing(order.kind, order.listing_id, &mut tx)
            .await?
            .ok_or(SettlementDbError::ListingNotFound(order.kind, order.listing_id))?;
        if listing.owner_id == order.buyer_id {
            return Err(MaterializeRejection::SelfOrderForbidden.into());
        }
        let outbid = match order.kind {
            ProductKind::Material | ProductKind::Machine => {
                if listing.status != ListingStatus::Available {
                    return Err(MaterializeRejection::ListingUnavailable.into());
                }
                if listing.stock < order.quantity {
                    return Err(MaterializeRejection::OutOfStock { available: listing.stock }.into());
                }
                None
            },
            ProductKind::Rental => {
                if listing.status != ListingStatus::Available {
                    return Err(MaterializeRejection::ListingUnavailable.into());
                }
                None
            },
            ProductKind::AuctionBid => {
                let top = orders::fetch_top_bid(listing.id, &mut tx).await?;
                let bid = order.bid_amount.unwrap_or(order.total_price);
                let top_bid = top.as_ref().and_then(|o| o.bid_amount);
                bidding::validate_bid(&listing, order.buyer_id, bid, top_bid, now).map_err(|e| match e {
                    BidRejection::AuctionNotOpen(_) => MaterializeRejection::AuctionClosed,
                    BidRejection::SelfBidForbidden => MaterializeRejection::SelfOrderForbidden,
                    BidRejection::BidTooLow { top_bid, start_price, .. } => {
                        MaterializeRejection::BidSuperseded { top_bid: top_bid.unwrap_or(start_price) }
                    },
                })?;
                top
            },
        };
        if order.wallet_amount.is_positive() {
            let mutation =
                WalletMutation::new(order.buyer_id, WalletTxType::Debit, order.wallet_amount, &order.client_order_key)
                    .with_note(format!("{} order for listing #{}", order.kind, order.listing_id));
            wallets::apply_mutation(mutation, &mut tx).await?;
        }
        let (kind, quantity) = (order.kind, order.quantity);
        let order = match orders::idempotent_insert(order, listing.owner_id, &mut tx).await? {
            orders::InsertOrderResult::Inserted(order) => order,
            orders::InsertOrderResult::AlreadyExists(existing) => {
                warn!("🗃️ Order #{} was inserted concurrently. Rolling back.", existing.id);
                return Ok(MaterializeOutcome::AlreadyExists(existing));
            },
        };
        match kind {
            ProductKind::Material | ProductKind::Machine => {
                listings::decrement_stock(kind, listing.id, quantity, &mut tx).await?;
            },
            ProductKind::Rental => {
                listings::set_status(kind, listing.id, ListingStatus::Reserved, &mut tx).await?;
            },
            ProductKind::AuctionBid => {},
        }
        tx.commit().await?;
        info!("🗃️ {kind} order #{} for listing #{} has been materialized", order.id, order.listing_id);
        Ok(MaterializeOutcome::Inserted { order, outbid })
    }

    async fn cancel_order(&self, order_id: i64) -> Result<CancelledOrder, SettlementDbError> {
        let mut tx = self.pool.begin().await?;
        orders::lock_order(order_id, &mut tx).await?;
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(SettlementDbError::OrderNotFound(order_id))?;
        if !order.status.is_cancellable() {
            return Err(SettlementDbError::OrderNotCancellable(order_id, order.status));
        }
        let order = orders::update_status(order_id, order.status, OrderStatusType::Cancelled, &mut tx).await?;
        listings::lock_listing(order.kind, order.listing_id, &mut tx).await?;
        match order.kind {
            ProductKind::Material | ProductKind::Machine => {
                listings::increment_stock(order.kind, order.listing_id, order.quantity, &mut tx).await?;
            },
            ProductKind::Rental => {
                listings::set_status(order.kind, order.listing_id, ListingStatus::Available, &mut tx).await?;
            },
            ProductKind::AuctionBid => {},
        }
        let wallet_refund = if order.wallet_amount.is_positive() {
            let mutation = WalletMutation::new(
                order.buyer_id,
                WalletTxType::Refund,
                order.wallet_amount,
                refund_key(&order.client_order_key),
            )
            .with_note(format!("Refund for cancelled order #{order_id}"));
            Some(wallets::apply_mutation(mutation, &mut tx).await?)
        } else {
            None
        };
        let hold = wallets::fetch_transaction(&hold_key(&order.client_order_key), &mut tx).await?;
        let released_hold = match hold {
            Some(hold) if hold.tx_type == WalletTxType::Hold && hold.status == WalletTxStatus::Succeeded => {
                let mutation = WalletMutation::new(
                    hold.user_id,
                    WalletTxType::Release,
                    hold.amount,
                    release_key(&order.client_order_key),
                )
                .with_note(format!("Hold released for cancelled order #{order_id}"));
                Some(wallets::apply_mutation(mutation, &mut tx).await?)
            },
            _ => None,
        };
        tx.commit().await?;
        info!("🗃️ Order #{order_id} has been cancelled");
        Ok(CancelledOrder { order, wallet_refund, released_hold })
    }

    async fn close(&mut self) -> Result<(), SettlementDbError> {
        self.pool.close().await;
        Ok(())
    }
}

impl ListingManagement for SqliteDatabase {
    async fn insert_listing(&self, listing: NewListing) -> Result<Listing, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        listings::insert_listing(listing, &mut conn).await
    }

    async fn fetch_listing(&self, kind: ProductKind, id: i64) -> Result<Option<Listing>, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        listings::fetch_listing(kind, id, &mut conn).await
    }

    async fn decrement_stock(&self, kind: ProductKind, id: i64, quantity: i64) -> Result<Listing, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        listings::decrement_stock(kind, id, quantity, &mut conn).await
    }

    async fn set_listing_status(
        &self,
        kind: ProductKind,
        id: i64,
        status: ListingStatus,
    ) -> Result<Listing, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        listings::set_status(kind, id, status, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(id, &mut conn).await
    }

    async fn fetch_order_by_client_key(&self, client_order_key: &str) -> Result<Option<Order>, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_client_key(client_order_key, &mut conn).await
    }

    async fn fetch_order_by_provider_payment_id(&self, payment_id: &str) -> Result<Option<Order>, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_provider_payment_id(payment_id, &mut conn).await
    }

    async fn fetch_orders_for_buyer(&self, buyer_id: i64) -> Result<Vec<Order>, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_buyer(buyer_id, &mut conn).await
    }

    async fn fetch_orders_for_listing(&self, listing_id: i64) -> Result<Vec<Order>, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_listing(listing_id, &mut conn).await
    }

    async fn fetch_top_bid(&self, listing_id: i64) -> Result<Option<Order>, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_top_bid(listing_id, &mut conn).await
    }

    async fn update_order_status(
        &self,
        id: i64,
        from: OrderStatusType,
        to: OrderStatusType,
    ) -> Result<Order, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_status(id, from, to, &mut conn).await
    }
}

impl WalletLedger for SqliteDatabase {
    async fn fetch_wallet(&self, user_id: i64) -> Result<Wallet, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        let wallet = wallets::fetch_wallet(user_id, &mut conn).await?;
        Ok(wallet.unwrap_or_else(|| Wallet::empty(user_id)))
    }

    async fn apply_wallet_mutation(&self, mutation: WalletMutation) -> Result<WalletTransaction, WalletLedgerError> {
        let mut tx = self.pool.begin().await?;
        let result = wallets::apply_mutation(mutation, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_wallet_transaction(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<WalletTransaction>, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_transaction(idempotency_key, &mut conn).await
    }

    async fn fetch_wallet_transactions(&self, user_id: i64) -> Result<Vec<WalletTransaction>, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        wallets::fetch_transactions(user_id, &mut conn).await
    }

    async fn update_wallet_transaction_status(
        &self,
        idempotency_key: &str,
        status: WalletTxStatus,
    ) -> Result<WalletTransaction, WalletLedgerError> {
        let mut tx = self.pool.begin().await?;
        let result = wallets::update_transaction_status(idempotency_key, status, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }
}

impl ReconciliationManagement for SqliteDatabase {
    async fn insert_reconciliation_item(
        &self,
        item: NewReconciliationItem,
    ) -> Result<InsertReconciliationResult, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        reconciliation::idempotent_insert(item, &mut conn).await
    }

    async fn fetch_reconciliation_item(&self, id: i64) -> Result<Option<ReconciliationItem>, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        reconciliation::fetch_item(id, &mut conn).await
    }

    async fn fetch_open_reconciliation_items(&self) -> Result<Vec<ReconciliationItem>, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        reconciliation::fetch_open_items(&mut conn).await
    }

    async fn claim_reconciliation_refund(&self, id: i64) -> Result<RefundClaim, SettlementDbError> {
        let mut tx = self.pool.begin().await?;
        let item = match reconciliation::mark_refunding(id, &mut tx).await? {
            Some(item) => item,
            None => {
                let item = reconciliation::fetch_item(id, &mut tx)
                    .await?
                    .ok_or(SettlementDbError::ReconciliationItemNotFound(id))?;
                return Ok(RefundClaim::Unavailable(item));
            },
        };
        let order = match (&item.client_order_key, item.reason) {
            (_, ReconciliationReason::BuyerCancelled) | (None, _) => None,
            (Some(key), _) => orders::fetch_order_by_client_key(key, &mut tx).await?,
        };
        let claim = match order {
            Some(order) => {
                let note = format!("Order #{} accounts for this payment. Nothing was refunded.", order.id);
                let item = reconciliation::resolve_claimed(id, &note, &mut tx).await?;
                RefundClaim::Settled { item, order }
            },
            None => RefundClaim::Claimed(item),
        };
        tx.commit().await?;
        Ok(claim)
    }

    async fn mark_reconciliation_refunded(
        &self,
        id: i64,
        refund_id: &str,
    ) -> Result<ReconciliationItem, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        reconciliation::mark_refunded(id, refund_id, &mut conn).await
    }

    async fn record_reconciliation_failure(
        &self,
        id: i64,
        error: &str,
    ) -> Result<ReconciliationItem, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        reconciliation::record_failure(id, error, &mut conn).await
    }

    async fn resolve_reconciliation_item(&self, id: i64, note: &str) -> Result<ReconciliationItem, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        reconciliation::resolve(id, note, &mut conn).await
    }
}
