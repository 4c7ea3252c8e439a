use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::OtpRecord, traits::BrokerDbError};

/// Stores an OTP for the order and moves the order Active → Finished. A duplicate `(order, otp)` pair inserts
/// nothing. Call inside a transaction; returns `true` if a new record was stored. Timestamps are bound from
/// chrono, same as the order writes, so the columns stay in one text format.
pub async fn attach_otp(order_id: i64, otp: &str, conn: &mut SqliteConnection) -> Result<bool, BrokerDbError> {
    let now = Utc::now();
    let inserted = sqlx::query(
        "INSERT INTO otps (order_id, otp, received_at) VALUES ($1, $2, $3) ON CONFLICT (order_id, otp) DO NOTHING",
    )
    .bind(order_id)
    .bind(otp)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .rows_affected() >
        0;
    if !inserted {
        debug!("🗃️ Order #{order_id} already holds this OTP. No action to take");
        return Ok(false);
    }
    sqlx::query("UPDATE orders SET status = 'Finished', updated_at = $1 WHERE id = $2 AND status = 'Active'")
        .bind(now)
        .bind(order_id)
        .execute(conn)
        .await?;
    debug!("🗃️ OTP attached to order #{order_id}");
    Ok(true)
}

pub async fn otps_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OtpRecord>, sqlx::Error> {
    let otps = sqlx::query_as("SELECT * FROM otps WHERE order_id = $1 ORDER BY received_at ASC, id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(otps)
}
