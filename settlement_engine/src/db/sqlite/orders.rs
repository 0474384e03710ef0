use chrono::Utc;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db::traits::SettlementDbError,
    db_types::{NewOrder, Order, OrderStatusType},
};

pub enum InsertOrderResult {
    Inserted(Order),
    AlreadyExists(Order),
}

/// Inserts the order, or returns the existing order if one with the same client order key or provider payment id is
/// already stored.
pub async fn idempotent_insert(
    order: NewOrder,
    seller_id: i64,
    conn: &mut SqliteConnection,
) -> Result<InsertOrderResult, SettlementDbError> {
    let key = order.client_order_key.clone();
    let payment_id = order.provider_payment_id.clone();
    match insert_order(order, seller_id, &mut *conn).await {
        Ok(order) => Ok(InsertOrderResult::Inserted(order)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = match fetch_order_by_client_key(&key, &mut *conn).await? {
                Some(order) => Some(order),
                None => fetch_order_by_provider_payment_id(&payment_id, &mut *conn).await?,
            };
            existing.map(InsertOrderResult::AlreadyExists).ok_or_else(|| {
                SettlementDbError::DatabaseError(format!("Unique violation for order {key}, but no order was found"))
            })
        },
        Err(e) => Err(e.into()),
    }
}

/// Inserts a new order using the given connection. This is not atomic. Embed this call inside a transaction if you
/// need atomicity, and pass `&mut tx` as the connection argument.
async fn insert_order(order: NewOrder, seller_id: i64, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                kind,
                buyer_id,
                seller_id,
                listing_id,
                status,
                quantity,
                unit_price,
                bid_amount,
                total_price,
                deposit_required,
                amount_paid,
                wallet_amount,
                gateway_amount,
                provider,
                provider_payment_id,
                client_order_key,
                cancel_until,
                created_at,
                updated_at
            ) VALUES (?, ?, ?, ?, 'Pending', ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *;
        "#,
    )
    .bind(order.kind)
    .bind(order.buyer_id)
    .bind(seller_id)
    .bind(order.listing_id)
    .bind(order.quantity)
    .bind(order.unit_price)
    .bind(order.bid_amount)
    .bind(order.total_price)
    .bind(order.deposit_required)
    .bind(order.amount_paid)
    .bind(order.wallet_amount)
    .bind(order.gateway_amount)
    .bind(order.provider)
    .bind(order.provider_payment_id)
    .bind(order.client_order_key)
    .bind(order.cancel_until)
    .bind(order.created_at)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ {} order #{} for listing #{} has been saved", order.kind, order.id, order.listing_id);
    Ok(order)
}

/// Takes the write lock on the order row.
pub async fn lock_order(id: i64, conn: &mut SqliteConnection) -> Result<(), SettlementDbError> {
    let result =
        sqlx::query("UPDATE orders SET updated_at = ? WHERE id = ?").bind(Utc::now()).bind(id).execute(conn).await?;
    if result.rows_affected() == 0 {
        return Err(SettlementDbError::OrderNotFound(id));
    }
    trace!("🗃️ Locked order #{id}");
    Ok(())
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, SettlementDbError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = ?").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_client_key(
    key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SettlementDbError> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE client_order_key = ?").bind(key).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_provider_payment_id(
    payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, SettlementDbError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE provider_payment_id = ?")
        .bind(payment_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_orders_for_buyer(
    buyer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SettlementDbError> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE buyer_id = ? ORDER BY id DESC")
        .bind(buyer_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

pub async fn fetch_orders_for_listing(
    listing_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, SettlementDbError> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE listing_id = ? ORDER BY id ASC")
        .bind(listing_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// The highest bid still in contention. Cancelled and deleted bids do not count.
pub async fn fetch_top_bid(listing_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, SettlementDbError> {
    let order = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE listing_id = ?
              AND kind = 'AuctionBid'
              AND status NOT IN ('Cancelled', 'DeletedByBuyer', 'DeletedBySeller')
            ORDER BY bid_amount DESC, id ASC
            LIMIT 1;
        "#,
    )
    .bind(listing_id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Changes the status of the order, but only if it is still `from`.
pub async fn update_status(
    id: i64,
    from: OrderStatusType,
    to: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, SettlementDbError> {
    let updated: Option<Order> =
        sqlx::query_as("UPDATE orders SET status = ?, updated_at = ? WHERE id = ? AND status = ? RETURNING *")
            .bind(to)
            .bind(Utc::now())
            .bind(id)
            .bind(from)
            .fetch_optional(&mut *conn)
            .await?;
    match updated {
        Some(order) => {
            debug!("🗃️ Order #{id} status changed from {from} to {to}");
            Ok(order)
        },
        None => {
            let order = fetch_order(id, conn).await?.ok_or(SettlementDbError::OrderNotFound(id))?;
            Err(SettlementDbError::OrderStatusChanged { id, expected: from, actual: order.status })
        },
    }
}
