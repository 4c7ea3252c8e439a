use smb_common::{Money, UserId};
use sqlx::SqliteConnection;

use crate::{
    db_types::{EntryKind, LedgerEntry},
    traits::{BrokerDbError, LedgerSummary},
};

/// Appends one ledger entry. Debits are stored with a negative amount, refunds with a positive one, so that the
/// sum of a user's entries is the wallet delta attributable to orders.
pub async fn insert_entry(
    order_id: i64,
    user_id: &UserId,
    amount: Money,
    kind: EntryKind,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, BrokerDbError> {
    let entry = sqlx::query_as(
        "INSERT INTO ledger (order_id, user_id, amount, kind) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(order_id)
    .bind(user_id.as_str())
    .bind(amount)
    .bind(kind.to_string())
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

pub async fn entries_for_user(
    user_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    let entries = sqlx::query_as("SELECT * FROM ledger WHERE user_id = $1 ORDER BY id ASC")
        .bind(user_id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(entries)
}

/// Reconciles the wallet balance against its sources: starting balance, ledger movements, confirmed top-ups.
pub async fn summary_for_user(
    user_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<LedgerSummary, BrokerDbError> {
    let (balance, starting_balance): (Money, Money) =
        sqlx::query_as("SELECT balance, starting_balance FROM users WHERE user_id = $1")
            .bind(user_id.as_str())
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| BrokerDbError::UserNotFound(user_id.clone()))?;
    let (ledger_total,): (Money,) =
        sqlx::query_as("SELECT COALESCE(SUM(amount), 0) FROM ledger WHERE user_id = $1")
            .bind(user_id.as_str())
            .fetch_one(&mut *conn)
            .await?;
    let (top_up_total,): (Money,) =
        sqlx::query_as("SELECT COALESCE(SUM(amount), 0) FROM top_ups WHERE user_id = $1")
            .bind(user_id.as_str())
            .fetch_one(conn)
            .await?;
    Ok(LedgerSummary { balance, starting_balance, ledger_total, top_up_total })
}
