use chrono::Utc;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db::traits::{InsertReconciliationResult, SettlementDbError},
    db_types::{NewReconciliationItem, ReconciliationItem, ReconciliationReason},
};

pub async fn idempotent_insert(
    item: NewReconciliationItem,
    conn: &mut SqliteConnection,
) -> Result<InsertReconciliationResult, SettlementDbError> {
    let now = Utc::now();
    let session_id = item.session_id.clone();
    let reason = item.reason;
    let result: Result<ReconciliationItem, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO reconciliation_items (
                session_id,
                client_order_key,
                user_id,
                provider_payment_id,
                amount,
                reason,
                status,
                note,
                created_at,
                updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 'Open', ?, ?, ?)
            RETURNING *;
        "#,
    )
    .bind(item.session_id)
    .bind(item.client_order_key)
    .bind(item.user_id)
    .bind(item.provider_payment_id)
    .bind(item.amount)
    .bind(item.reason)
    .bind(item.note)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await;
    match result {
        Ok(item) => {
            debug!("🗃️ Reconciliation item #{} ({}) has been queued for session {session_id}", item.id, item.reason);
            Ok(InsertReconciliationResult::Inserted(item))
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = fetch_by_session(&session_id, reason, conn).await?.ok_or_else(|| {
                SettlementDbError::DatabaseError(format!(
                    "Unique violation for reconciliation of {session_id}, but no item was found"
                ))
            })?;
            Ok(InsertReconciliationResult::AlreadyExists(existing))
        },
        Err(e) => Err(e.into()),
    }
}

async fn fetch_by_session(
    session_id: &str,
    reason: ReconciliationReason,
    conn: &mut SqliteConnection,
) -> Result<Option<ReconciliationItem>, SettlementDbError> {
    let item = sqlx::query_as("SELECT * FROM reconciliation_items WHERE session_id = ? AND reason = ?")
        .bind(session_id)
        .bind(reason)
        .fetch_optional(conn)
        .await?;
    Ok(item)
}

/// The first item recorded against a purchase, other than a cancellation refund.
pub async fn fetch_for_client_key(
    client_order_key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ReconciliationItem>, SettlementDbError> {
    let item = sqlx::query_as(
        r#"
            SELECT * FROM reconciliation_items
            WHERE client_order_key = ? AND reason <> 'BuyerCancelled'
            ORDER BY id ASC
            LIMIT 1;
        "#,
    )
    .bind(client_order_key)
    .fetch_optional(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_item(id: i64, conn: &mut SqliteConnection) -> Result<Option<ReconciliationItem>, SettlementDbError> {
    let item = sqlx::query_as("SELECT * FROM reconciliation_items WHERE id = ?").bind(id).fetch_optional(conn).await?;
    Ok(item)
}

pub async fn fetch_open_items(conn: &mut SqliteConnection) -> Result<Vec<ReconciliationItem>, SettlementDbError> {
    let items = sqlx::query_as("SELECT * FROM reconciliation_items WHERE status = 'Open' ORDER BY id ASC")
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Moves an `Open` item to `Refunding`. Returns `None` if the item was not open.
pub async fn mark_refunding(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ReconciliationItem>, SettlementDbError> {
    let claimed: Option<ReconciliationItem> = sqlx::query_as(
        r#"
            UPDATE reconciliation_items SET status = 'Refunding', updated_at = ?
            WHERE id = ? AND status = 'Open'
            RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    if claimed.is_some() {
        trace!("🗃️ Reconciliation item #{id} is being refunded");
    }
    Ok(claimed)
}

pub async fn mark_refunded(
    id: i64,
    refund_id: &str,
    conn: &mut SqliteConnection,
) -> Result<ReconciliationItem, SettlementDbError> {
    let updated: Option<ReconciliationItem> = sqlx::query_as(
        r#"
            UPDATE reconciliation_items
            SET status = 'Refunded', refund_id = ?, attempts = attempts + 1, last_error = NULL, updated_at = ?
            WHERE id = ? AND status = 'Refunding'
            RETURNING *;
        "#,
    )
    .bind(refund_id)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(item) => {
            debug!("🗃️ Reconciliation item #{id} has been refunded ({refund_id})");
            Ok(item)
        },
        None => fetch_item(id, conn).await?.ok_or(SettlementDbError::ReconciliationItemNotFound(id)),
    }
}

pub async fn record_failure(
    id: i64,
    error: &str,
    conn: &mut SqliteConnection,
) -> Result<ReconciliationItem, SettlementDbError> {
    let updated: Option<ReconciliationItem> = sqlx::query_as(
        r#"
            UPDATE reconciliation_items
            SET status = 'Open', attempts = attempts + 1, last_error = ?, updated_at = ?
            WHERE id = ? AND status = 'Refunding'
            RETURNING *;
        "#,
    )
    .bind(error)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(item) => Ok(item),
        None => fetch_item(id, conn).await?.ok_or(SettlementDbError::ReconciliationItemNotFound(id)),
    }
}

const RESOLVE_OPEN_OR_REFUNDED: &str = r#"
    UPDATE reconciliation_items SET status = 'Resolved', note = ?, updated_at = ?
    WHERE id = ? AND status IN ('Open', 'Refunded')
    RETURNING *;
"#;

const RESOLVE_CLAIMED: &str = r#"
    UPDATE reconciliation_items SET status = 'Resolved', note = ?, updated_at = ?
    WHERE id = ? AND status = 'Refunding'
    RETURNING *;
"#;

/// Resolves an `Open` or `Refunded` item. Items with a refund in flight are returned unchanged.
pub async fn resolve(
    id: i64,
    note: &str,
    conn: &mut SqliteConnection,
) -> Result<ReconciliationItem, SettlementDbError> {
    resolve_with(RESOLVE_OPEN_OR_REFUNDED, id, note, conn).await
}

/// Resolves an item the caller has claimed for a refund.
pub async fn resolve_claimed(
    id: i64,
    note: &str,
    conn: &mut SqliteConnection,
) -> Result<ReconciliationItem, SettlementDbError> {
    resolve_with(RESOLVE_CLAIMED, id, note, conn).await
}

async fn resolve_with(
    sql: &str,
    id: i64,
    note: &str,
    conn: &mut SqliteConnection,
) -> Result<ReconciliationItem, SettlementDbError> {
    let updated: Option<ReconciliationItem> = sqlx::query_as(sql)
        .bind(note)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    match updated {
        Some(item) => {
            debug!("🗃️ Reconciliation item #{id} has been resolved");
            Ok(item)
        },
        None => fetch_item(id, conn).await?.ok_or(SettlementDbError::ReconciliationItemNotFound(id)),
    }
}
