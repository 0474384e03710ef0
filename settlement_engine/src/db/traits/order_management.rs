use crate::{
    db::traits::SettlementDbError,
    db_types::{Order, OrderStatusType},
};

/// Queries over the unified order store.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, SettlementDbError>;

    async fn fetch_order_by_client_key(&self, client_order_key: &str) -> Result<Option<Order>, SettlementDbError>;

    async fn fetch_order_by_provider_payment_id(&self, payment_id: &str) -> Result<Option<Order>, SettlementDbError>;

    /// All orders for the buyer, newest first.
    async fn fetch_orders_for_buyer(&self, buyer_id: i64) -> Result<Vec<Order>, SettlementDbError>;

    /// All orders placed against the listing, oldest first.
    async fn fetch_orders_for_listing(&self, listing_id: i64) -> Result<Vec<Order>, SettlementDbError>;

    /// The highest auction bid for the listing among orders that still count as bids. Ties go to the earliest bid.
    async fn fetch_top_bid(&self, listing_id: i64) -> Result<Option<Order>, SettlementDbError>;

    /// Changes the order status from `from` to `to`. If the order is no longer in the `from` state,
    /// `OrderStatusChanged` is returned and nothing is modified.
    ///
    /// This performs no side effects beyond the status change. Cancellations go through
    /// [`crate::db::traits::SettlementDatabase::cancel_order`].
    async fn update_order_status(
        &self,
        id: i64,
        from: OrderStatusType,
        to: OrderStatusType,
    ) -> Result<Order, SettlementDbError>;
}
