//! Direct-SQL catalog seeding for tests. Production code never writes the catalog; tests need to.
use chrono::{DateTime, Utc};
use smb_common::{Money, ServerId, UserId};
use sqlx::SqlitePool;

use crate::SqliteDatabase;

pub async fn seed_user(db: &SqliteDatabase, user_id: &UserId, balance: Money) {
    sqlx::query("INSERT INTO users (user_id, balance, starting_balance) VALUES ($1, $2, $2)")
        .bind(user_id.as_str())
        .bind(balance)
        .execute(db.pool())
        .await
        .expect("Error seeding user");
}

pub async fn seed_server(db: &SqliteDatabase, server: ServerId, provider: &str, maintenance: bool) {
    sqlx::query(
        "INSERT INTO servers (server, provider, api_key, maintenance) VALUES ($1, $2, 'test-key', $3) \
         ON CONFLICT (server) DO UPDATE SET provider = $2, maintenance = $3",
    )
    .bind(server.value())
    .bind(provider)
    .bind(maintenance)
    .execute(db.pool())
    .await
    .expect("Error seeding server");
}

pub async fn set_site_maintenance(db: &SqliteDatabase, down: bool) {
    sqlx::query("UPDATE servers SET maintenance = $1 WHERE server = 0")
        .bind(down)
        .execute(db.pool())
        .await
        .expect("Error setting the site maintenance flag");
}

pub async fn seed_service(db: &SqliteDatabase, service: &str, server: ServerId, code: &str, price: Money) {
    sqlx::query("INSERT INTO services (service, server, code, price) VALUES ($1, $2, $3, $4)")
        .bind(service)
        .bind(server.value())
        .bind(code)
        .bind(price)
        .execute(db.pool())
        .await
        .expect("Error seeding service");
}

pub async fn seed_server_discount(db: &SqliteDatabase, server: ServerId, amount: Money) {
    sqlx::query("INSERT INTO server_discounts (server, amount) VALUES ($1, $2)")
        .bind(server.value())
        .bind(amount)
        .execute(db.pool())
        .await
        .expect("Error seeding server discount");
}

pub async fn seed_service_discount(db: &SqliteDatabase, service: &str, server: ServerId, amount: Money) {
    sqlx::query("INSERT INTO service_discounts (service, server, amount) VALUES ($1, $2, $3)")
        .bind(service)
        .bind(server.value())
        .bind(amount)
        .execute(db.pool())
        .await
        .expect("Error seeding service discount");
}

pub async fn seed_user_discount(
    db: &SqliteDatabase,
    user_id: &UserId,
    service: &str,
    server: ServerId,
    amount: Money,
) {
    sqlx::query("INSERT INTO user_discounts (user_id, service, server, amount) VALUES ($1, $2, $3, $4)")
        .bind(user_id.as_str())
        .bind(service)
        .bind(server.value())
        .bind(amount)
        .execute(db.pool())
        .await
        .expect("Error seeding user discount");
}

pub async fn disarm_abuse_rule(db: &SqliteDatabase, rule: &str) {
    sqlx::query("UPDATE abuse_rules SET disarmed = 1 WHERE rule = $1")
        .bind(rule)
        .execute(db.pool())
        .await
        .expect("Error disarming abuse rule");
}

/// Rewrites an order's timestamps so that hold-period and abuse-window tests can place events in the past.
pub async fn backdate_order(pool: &SqlitePool, order_id: i64, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
    sqlx::query("UPDATE orders SET created_at = $1, updated_at = $2 WHERE id = $3")
        .bind(created_at)
        .bind(updated_at)
        .bind(order_id)
        .execute(pool)
        .await
        .expect("Error backdating order");
}

/// Pulls an order's deadline in so that sweep tests do not have to wait 20 minutes.
pub async fn set_order_expiry(pool: &SqlitePool, order_id: i64, expires_at: DateTime<Utc>) {
    sqlx::query("UPDATE orders SET expires_at = $1 WHERE id = $2")
        .bind(expires_at)
        .bind(order_id)
        .execute(pool)
        .await
        .expect("Error setting order expiry");
}
