use chrono::{DateTime, Utc};
use log::debug;
use smb_common::UserId;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderStatusType},
    traits::BrokerDbError,
};

/// Inserts a new Active order using the given connection. This is not atomic on its own. Embed this call inside a
/// transaction alongside the wallet debit and ledger entry, passing `&mut *tx` as the connection argument.
///
/// All order timestamps are bound from chrono rather than written with SQLite's `CURRENT_TIMESTAMP`. The two
/// produce different text encodings, and `recent_cancellations` sorts `updated_at` lexicographically, so the
/// column must carry a single format.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, BrokerDbError> {
    let now = Utc::now();
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                user_id,
                service,
                server,
                price,
                number_id,
                phone_number,
                status,
                created_at,
                updated_at,
                expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, 'Active', $7, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(order.user_id)
    .bind(order.service)
    .bind(order.server)
    .bind(order.price)
    .bind(order.number_id)
    .bind(order.phone_number)
    .bind(now)
    .bind(order.expires_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order #{} inserted for user {}", order.id, order.user_id);
    Ok(order)
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

/// Moves an Active order to a terminal status. Returns `None` if the order was not Active, in which case nothing
/// was changed. The `WHERE status = 'Active'` guard is what enforces exactly-once annulment under concurrency.
pub async fn transition_from_active(
    id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, BrokerDbError> {
    let order: Option<Order> = sqlx::query_as(
        "UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = 'Active' RETURNING *",
    )
    .bind(status.to_string())
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Active orders whose deadline falls on or before `horizon`, oldest deadline first.
pub async fn expiring_orders(
    horizon: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders =
        sqlx::query_as("SELECT * FROM orders WHERE status = 'Active' AND expires_at <= $1 ORDER BY expires_at ASC")
            .bind(horizon)
            .fetch_all(conn)
            .await?;
    Ok(orders)
}

/// The user's Cancelled orders, most recently cancelled first. `updated_at` is the cancellation instant since
/// terminal states admit no further updates.
pub async fn recent_cancellations(
    user_id: &UserId,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        "SELECT * FROM orders WHERE user_id = $1 AND status = 'Cancelled' ORDER BY updated_at DESC, id DESC LIMIT $2",
    )
    .bind(user_id.as_str())
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

pub async fn orders_for_user(user_id: &UserId, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at ASC")
        .bind(user_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(orders)
}
