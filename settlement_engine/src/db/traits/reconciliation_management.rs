use crate::{
    db::traits::{InsertReconciliationResult, RefundClaim, SettlementDbError},
    db_types::{NewReconciliationItem, ReconciliationItem},
};

/// The queue of captured payments that need a refund or a human decision.
#[allow(async_fn_in_trait)]
pub trait ReconciliationManagement {
    /// Adds an item to the queue. Items are unique per session id and reason, so recording the same failure twice
    /// returns the existing item.
    async fn insert_reconciliation_item(
        &self,
        item: NewReconciliationItem,
    ) -> Result<InsertReconciliationResult, SettlementDbError>;

    async fn fetch_reconciliation_item(&self, id: i64) -> Result<Option<ReconciliationItem>, SettlementDbError>;

    async fn fetch_open_reconciliation_items(&self) -> Result<Vec<ReconciliationItem>, SettlementDbError>;

    /// Atomically moves an `Open` item to `Refunding`, so that exactly one caller refunds it.
    ///
    /// Unless the item records a cancellation, the claim fails over to [`RefundClaim::Settled`] when an order exists
    /// for the item's client order key: the captured money is accounted for and must not be returned.
    async fn claim_reconciliation_refund(&self, id: i64) -> Result<RefundClaim, SettlementDbError>;

    /// Marks a claimed item as refunded. Items that are not `Refunding` are returned unchanged.
    async fn mark_reconciliation_refunded(
        &self,
        id: i64,
        refund_id: &str,
    ) -> Result<ReconciliationItem, SettlementDbError>;

    /// Records a failed refund attempt and gives the claim up. The item is `Open` again.
    async fn record_reconciliation_failure(
        &self,
        id: i64,
        error: &str,
    ) -> Result<ReconciliationItem, SettlementDbError>;

    /// Closes an item by hand.
    async fn resolve_reconciliation_item(&self, id: i64, note: &str)
        -> Result<ReconciliationItem, SettlementDbError>;
}
