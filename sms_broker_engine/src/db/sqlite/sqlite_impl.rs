//! `SqliteDatabase` is the concrete SQLite implementation of [`BrokerDatabase`].
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use provider_tools::{async_trait, ProviderProfile};
use smb_common::{Money, ServerId, UserId};
use sqlx::SqlitePool;

use super::{catalog, db_url, ledger, new_pool, orders, otps, users};
use crate::{
    db_types::{EntryKind, LedgerEntry, NewOrder, Order, OrderStatusType, OtpRecord, ServerEntry, ServiceEntry, User},
    traits::{BrokerDatabase, BrokerDbError, DiscountSet, LedgerSummary},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

#[async_trait]
impl BrokerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_user(&self, user_id: &UserId) -> Result<Option<User>, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_user(user_id, &mut conn).await?;
        Ok(user)
    }

    async fn upsert_user(&self, user_id: &UserId, starting_balance: Money) -> Result<User, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        users::upsert_user(user_id, starting_balance, &mut conn).await
    }

    async fn block_user(&self, user_id: &UserId, reason: &str) -> Result<(), BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        users::block_user(user_id, reason, &mut conn).await
    }

    async fn confirm_top_up(&self, user_id: &UserId, txid: &str, amount: Money) -> Result<bool, BrokerDbError> {
        let mut tx = self.pool.begin().await?;
        let credited = users::confirm_top_up(user_id, txid, amount, &mut tx).await?;
        tx.commit().await?;
        Ok(credited)
    }

    async fn ledger_summary(&self, user_id: &UserId) -> Result<LedgerSummary, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        ledger::summary_for_user(user_id, &mut conn).await
    }

    /// Stores a new Active order, debits the wallet by the resolved price and writes the Debit ledger entry, all
    /// in one transaction. If the balance no longer covers the price, nothing is changed.
    async fn process_new_order(&self, order: NewOrder) -> Result<Order, BrokerDbError> {
        let mut tx = self.pool.begin().await?;
        let price = order.price;
        let user_id = order.user_id.clone();
        let debited = users::try_debit(&user_id, price, &mut tx).await?;
        if !debited {
            tx.rollback().await?;
            return Err(BrokerDbError::InsufficientFunds(user_id));
        }
        let order = orders::insert_order(order, &mut tx).await?;
        ledger::insert_entry(order.id, &user_id, -price, EntryKind::Debit, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order #{} saved. {price} debited from user {user_id}", order.id);
        Ok(order)
    }

    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(id, &mut conn).await?;
        Ok(order)
    }

    async fn attach_otp(&self, order_id: i64, otp: &str) -> Result<bool, BrokerDbError> {
        let mut tx = self.pool.begin().await?;
        let inserted = otps::attach_otp(order_id, otp, &mut tx).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn fetch_otps(&self, order_id: i64) -> Result<Vec<OtpRecord>, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        let otps = otps::otps_for_order(order_id, &mut conn).await?;
        Ok(otps)
    }

    async fn annul_order(
        &self,
        order_id: i64,
        status: OrderStatusType,
        refund: bool,
    ) -> Result<Option<Order>, BrokerDbError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::transition_from_active(order_id, status, &mut tx).await?;
        let Some(order) = order else {
            tx.rollback().await?;
            debug!("🗃️ Order #{order_id} is no longer Active. Annulment skipped");
            return Ok(None);
        };
        if refund {
            users::credit(&order.user_id, order.price, &mut tx).await?;
            ledger::insert_entry(order.id, &order.user_id, order.price, EntryKind::Refund, &mut tx).await?;
            debug!("🗃️ Order #{order_id} is now {status}. {} refunded to user {}", order.price, order.user_id);
        } else {
            debug!("🗃️ Order #{order_id} is now {status}. No refund due");
        }
        tx.commit().await?;
        Ok(Some(order))
    }

    async fn expiring_orders(&self, horizon: DateTime<Utc>) -> Result<Vec<Order>, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::expiring_orders(horizon, &mut conn).await?;
        Ok(orders)
    }

    async fn recent_cancellations(&self, user_id: &UserId, limit: i64) -> Result<Vec<Order>, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::recent_cancellations(user_id, limit, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::orders_for_user(user_id, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_ledger_for_user(&self, user_id: &UserId) -> Result<Vec<LedgerEntry>, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        let entries = ledger::entries_for_user(user_id, &mut conn).await?;
        Ok(entries)
    }

    async fn site_maintenance(&self) -> Result<bool, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        let down = catalog::site_maintenance(&mut conn).await?;
        Ok(down)
    }

    async fn fetch_server(&self, server: ServerId) -> Result<Option<ServerEntry>, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        let entry = catalog::fetch_server(server, &mut conn).await?;
        Ok(entry)
    }

    async fn fetch_service(&self, service: &str, server: ServerId) -> Result<Option<ServiceEntry>, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        let entry = catalog::fetch_service(service, server, &mut conn).await?;
        Ok(entry)
    }

    async fn fetch_discounts(
        &self,
        user_id: &UserId,
        service: &str,
        server: ServerId,
    ) -> Result<DiscountSet, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        let discounts = catalog::fetch_discounts(user_id, service, server, &mut conn).await?;
        Ok(discounts)
    }

    async fn provider_profiles(&self) -> Result<Vec<ProviderProfile>, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        let profiles = catalog::provider_profiles(&mut conn).await?;
        Ok(profiles)
    }

    async fn abuse_rule_disarmed(&self, rule: &str) -> Result<bool, BrokerDbError> {
        let mut conn = self.pool.acquire().await?;
        let disarmed = catalog::abuse_rule_disarmed(rule, &mut conn).await?;
        Ok(disarmed)
    }

    async fn close(&mut self) -> Result<(), BrokerDbError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
