use chrono::{DateTime, Utc};

use crate::{
    db::traits::{
        CancelledOrder,
        ListingManagement,
        MaterializeOutcome,
        OrderManagement,
        ReconciliationManagement,
        SettlementDbError,
        WalletLedger,
    },
    db_types::NewOrder,
};

/// This trait defines the highest level of behaviour for backends supporting the settlement engine.
///
/// The operations here touch several tables at once and must each run in a single atomic transaction that begins by
/// locking the listing (or order) involved.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase:
    Clone + ListingManagement + OrderManagement + WalletLedger + ReconciliationManagement
{
    /// The URL of the database
    fn url(&self) -> &str;

    /// Turns a paid checkout into an order, in a single atomic transaction:
    /// * Lock the listing.
    /// * If an order already exists for `order.client_order_key`, return it and do nothing else.
    /// * Re-validate stock (materials, machines), availability (rentals) or the bid (auctions) at `now`.
    /// * Debit `order.wallet_amount` from the buyer's wallet, keyed by the client order key.
    /// * Insert the order as `Pending`.
    /// * Decrement stock (materials, machines) or reserve the listing (rentals).
    ///
    /// If re-validation fails, [`SettlementDbError::Rejected`] is returned and nothing is written.
    async fn materialize_order(&self, order: NewOrder, now: DateTime<Utc>)
        -> Result<MaterializeOutcome, SettlementDbError>;

    /// Cancels a `Pending` or `Confirmed` order in a single atomic transaction: the status becomes `Cancelled`, the
    /// wallet-funded portion is refunded, any hold tied to the order is released, and stock is restored (materials,
    /// machines) or the listing is made available again (rentals).
    ///
    /// Ownership and the cancellation window are the caller's concern.
    async fn cancel_order(&self, order_id: i64) -> Result<CancelledOrder, SettlementDbError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementDbError> {
        Ok(())
    }
}
