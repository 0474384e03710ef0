use chrono::Utc;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db::traits::{MaterializeRejection, SettlementDbError},
    db_types::{Listing, ListingStatus, NewListing, ProductKind},
};

pub async fn insert_listing(listing: NewListing, conn: &mut SqliteConnection) -> Result<Listing, SettlementDbError> {
    let now = Utc::now();
    let listing: Listing = sqlx::query_as(
        r#"
            INSERT INTO listings (
                kind,
                owner_id,
                title,
                price,
                stock,
                status,
                start_price,
                start_date,
                end_date,
                created_at,
                updated_at
            ) VALUES (?, ?, ?, ?, ?, 'Available', ?, ?, ?, ?, ?)
            RETURNING *;
        "#,
    )
    .bind(listing.kind)
    .bind(listing.owner_id)
    .bind(listing.title)
    .bind(listing.price)
    .bind(listing.stock)
    .bind(listing.start_price)
    .bind(listing.start_date)
    .bind(listing.end_date)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ {} listing #{} has been created", listing.kind, listing.id);
    Ok(listing)
}

/// Takes the write lock on the listing row by bumping its lock version. In SQLite this acquires the database write
/// lock, so it must be the first statement of any transaction that reads the listing and then acts on what it read.
pub async fn lock_listing(kind: ProductKind, id: i64, conn: &mut SqliteConnection) -> Result<(), SettlementDbError> {
    let result = sqlx::query("UPDATE listings SET lock_version = lock_version + 1 WHERE id = ? AND kind = ?")
        .bind(id)
        .bind(kind)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(SettlementDbError::ListingNotFound(kind, id));
    }
    trace!("🗃️ Locked {kind} listing #{id}");
    Ok(())
}

pub async fn fetch_listing(
    kind: ProductKind,
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Listing>, SettlementDbError> {
    let listing = sqlx::query_as("SELECT * FROM listings WHERE id = ? AND kind = ?")
        .bind(id)
        .bind(kind)
        .fetch_optional(conn)
        .await?;
    Ok(listing)
}

/// Removes `quantity` units from stock. The check and the decrement are a single statement, so stock can never go
/// negative.
pub async fn decrement_stock(
    kind: ProductKind,
    id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Listing, SettlementDbError> {
    let updated: Option<Listing> = sqlx::query_as(
        r#"
            UPDATE listings SET stock = stock - ?, updated_at = ?
            WHERE id = ? AND kind = ? AND stock >= ?
            RETURNING *;
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(id)
    .bind(kind)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(listing) => {
            debug!("🗃️ {kind} listing #{id} stock reduced by {quantity} to {}", listing.stock);
            Ok(listing)
        },
        None => {
            let listing =
                fetch_listing(kind, id, conn).await?.ok_or(SettlementDbError::ListingNotFound(kind, id))?;
            Err(MaterializeRejection::OutOfStock { available: listing.stock }.into())
        },
    }
}

pub async fn increment_stock(
    kind: ProductKind,
    id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Listing, SettlementDbError> {
    let listing: Option<Listing> =
        sqlx::query_as("UPDATE listings SET stock = stock + ?, updated_at = ? WHERE id = ? AND kind = ? RETURNING *")
            .bind(quantity)
            .bind(Utc::now())
            .bind(id)
            .bind(kind)
            .fetch_optional(conn)
            .await?;
    let listing = listing.ok_or(SettlementDbError::ListingNotFound(kind, id))?;
    debug!("🗃️ {kind} listing #{id} stock restored by {quantity} to {}", listing.stock);
    Ok(listing)
}

pub async fn set_status(
    kind: ProductKind,
    id: i64,
    status: ListingStatus,
    conn: &mut SqliteConnection,
) -> Result<Listing, SettlementDbError> {
    let listing: Option<Listing> =
        sqlx::query_as("UPDATE listings SET status = ?, updated_at = ? WHERE id = ? AND kind = ? RETURNING *")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .bind(kind)
            .fetch_optional(conn)
            .await?;
    let listing = listing.ok_or(SettlementDbError::ListingNotFound(kind, id))?;
    debug!("🗃️ {kind} listing #{id} is now {status}");
    Ok(listing)
}
