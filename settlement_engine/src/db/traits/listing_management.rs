use crate::{
    db::traits::SettlementDbError,
    db_types::{Listing, ListingStatus, NewListing, ProductKind},
};

/// The listing repository. The catalogue itself is managed elsewhere; the settlement engine only needs to read
/// listings and adjust their stock and status.
#[allow(async_fn_in_trait)]
pub trait ListingManagement {
    /// Stores a new listing. Used to seed the catalogue.
    async fn insert_listing(&self, listing: NewListing) -> Result<Listing, SettlementDbError>;

    /// Fetches the listing with the given id. Returns `None` if there is no such listing, or it is of a different kind.
    async fn fetch_listing(&self, kind: ProductKind, id: i64) -> Result<Option<Listing>, SettlementDbError>;

    /// Removes `quantity` units from the listing stock, failing with `OutOfStock` if there are not enough.
    async fn decrement_stock(&self, kind: ProductKind, id: i64, quantity: i64) -> Result<Listing, SettlementDbError>;

    async fn set_listing_status(
        &self,
        kind: ProductKind,
        id: i64,
        status: ListingStatus,
    ) -> Result<Listing, SettlementDbError>;

    async fn close_listing(&self, kind: ProductKind, id: i64) -> Result<Listing, SettlementDbError> {
        self.set_listing_status(kind, id, ListingStatus::Closed).await
    }
}
