use log::debug;
use smb_common::{Money, UserId};
use sqlx::SqliteConnection;

use crate::{db_types::User, traits::BrokerDbError};

pub async fn fetch_user(user_id: &UserId, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    let user =
        sqlx::query_as("SELECT * FROM users WHERE user_id = $1").bind(user_id.as_str()).fetch_optional(conn).await?;
    Ok(user)
}

/// Creates the user with the given opening balance if absent. An existing user is returned unchanged.
pub async fn upsert_user(
    user_id: &UserId,
    starting_balance: Money,
    conn: &mut SqliteConnection,
) -> Result<User, BrokerDbError> {
    let user: User = sqlx::query_as(
        r#"
            INSERT INTO users (user_id, balance, starting_balance)
            VALUES ($1, $2, $2)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = CURRENT_TIMESTAMP
            RETURNING *;
        "#,
    )
    .bind(user_id.as_str())
    .bind(starting_balance)
    .fetch_one(conn)
    .await?;
    Ok(user)
}

/// Debits the wallet by `amount` only if the balance covers it and the user is not blocked. Returns `false`
/// (and moves no money) otherwise.
pub async fn try_debit(user_id: &UserId, amount: Money, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET balance = balance - $1, updated_at = CURRENT_TIMESTAMP \
         WHERE user_id = $2 AND balance >= $1 AND blocked = 0",
    )
    .bind(amount)
    .bind(user_id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn credit(user_id: &UserId, amount: Money, conn: &mut SqliteConnection) -> Result<(), BrokerDbError> {
    let result =
        sqlx::query("UPDATE users SET balance = balance + $1, updated_at = CURRENT_TIMESTAMP WHERE user_id = $2")
            .bind(amount)
            .bind(user_id.as_str())
            .execute(conn)
            .await?;
    if result.rows_affected() == 0 {
        return Err(BrokerDbError::UserNotFound(user_id.clone()));
    }
    Ok(())
}

pub async fn block_user(user_id: &UserId, reason: &str, conn: &mut SqliteConnection) -> Result<(), BrokerDbError> {
    let result = sqlx::query(
        "UPDATE users SET blocked = 1, blocked_reason = $1, updated_at = CURRENT_TIMESTAMP WHERE user_id = $2",
    )
    .bind(reason)
    .bind(user_id.as_str())
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(BrokerDbError::UserNotFound(user_id.clone()));
    }
    debug!("🗃️ User {user_id} blocked: {reason}");
    Ok(())
}

/// Records a confirmed top-up and credits the wallet. Idempotent on `txid`: replaying a confirmation inserts
/// nothing and credits nothing.
pub async fn confirm_top_up(
    user_id: &UserId,
    txid: &str,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<bool, BrokerDbError> {
    let inserted = sqlx::query(
        "INSERT INTO top_ups (txid, user_id, amount) VALUES ($1, $2, $3) ON CONFLICT (txid) DO NOTHING",
    )
    .bind(txid)
    .bind(user_id.as_str())
    .bind(amount)
    .execute(&mut *conn)
    .await?
    .rows_affected() >
        0;
    if inserted {
        credit(user_id, amount, conn).await?;
        debug!("🗃️ Top-up {txid} credited {amount} to user {user_id}");
    } else {
        debug!("🗃️ Top-up {txid} has already been processed. No action to take");
    }
    Ok(inserted)
}
