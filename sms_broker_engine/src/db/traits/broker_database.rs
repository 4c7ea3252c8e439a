use chrono::{DateTime, Utc};
use provider_tools::{async_trait, ProviderProfile};
use smb_common::{Money, ServerId, UserId};
use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderStatusType, OtpRecord, ServerEntry, ServiceEntry, User},
    traits::{DiscountSet, LedgerSummary},
};

/// This trait defines the persistence behaviour backends must provide to support the broker engine.
///
/// This behaviour includes:
/// * User wallet reads and the atomic debit/credit operations paired with order transitions.
/// * Order lifecycle storage: insertion, OTP attachment, annulment.
/// * Catalog reads: servers, services and the three discount layers.
/// * The cancellation-abuse bookkeeping (recent cancels, block flag, rule override).
///
/// Every mutation that pairs a wallet movement with an order-status change is atomic: both are applied in one
/// transaction or neither is.
///
/// The trait is `async_trait` rather than native async fns because the single-flight queues run whole operations
/// as spawned jobs, which requires the backend futures to be `Send`.
#[async_trait]
pub trait BrokerDatabase: Clone + Send + Sync + 'static {
    /// The URL of the database
    fn url(&self) -> &str;

    // ----------------------------------------- Users & wallet ------------------------------------------------------

    async fn fetch_user(&self, user_id: &UserId) -> Result<Option<User>, BrokerDbError>;

    /// Creates the user if absent; the wallet opens (and stays) at `starting_balance` if the user already exists.
    async fn upsert_user(&self, user_id: &UserId, starting_balance: Money) -> Result<User, BrokerDbError>;

    /// Marks the user as blocked with the given reason. Blocking only prevents future acquisitions.
    async fn block_user(&self, user_id: &UserId, reason: &str) -> Result<(), BrokerDbError>;

    /// Credits the wallet for an externally verified top-up. Idempotent on `txid`: a repeated confirmation returns
    /// `false` and moves no money.
    async fn confirm_top_up(&self, user_id: &UserId, txid: &str, amount: Money) -> Result<bool, BrokerDbError>;

    /// Reconciles the wallet balance against the ledger and confirmed top-ups.
    async fn ledger_summary(&self, user_id: &UserId) -> Result<LedgerSummary, BrokerDbError>;

    // ----------------------------------------- Orders & ledger -----------------------------------------------------

    /// Stores a new Active order and, in the same transaction, debits the wallet by `order.price` and writes the
    /// Debit ledger entry. Fails without any mutation if the balance no longer covers the price.
    async fn process_new_order(&self, order: NewOrder) -> Result<Order, BrokerDbError>;

    async fn fetch_order(&self, id: i64) -> Result<Option<Order>, BrokerDbError>;

    /// Attaches an OTP to the order and transitions it Active → Finished. A duplicate `(order, otp)` pair is a
    /// no-op. Returns `true` if this call stored a new record.
    async fn attach_otp(&self, order_id: i64, otp: &str) -> Result<bool, BrokerDbError>;

    async fn fetch_otps(&self, order_id: i64) -> Result<Vec<OtpRecord>, BrokerDbError>;

    /// Transitions an Active order to the given terminal status. When `refund` is set, the wallet is credited with
    /// the order price and a Refund ledger entry is written, all in one transaction.
    ///
    /// Returns `None` without touching anything if the order is no longer Active, which is what makes a second
    /// cancel (or a sweep racing a manual cancel) incapable of a double refund.
    async fn annul_order(
        &self,
        order_id: i64,
        status: OrderStatusType,
        refund: bool,
    ) -> Result<Option<Order>, BrokerDbError>;

    /// Active orders whose `expires_at` falls on or before the horizon, oldest deadline first.
    async fn expiring_orders(&self, horizon: DateTime<Utc>) -> Result<Vec<Order>, BrokerDbError>;

    /// The user's Cancelled orders, most recently cancelled first, at most `limit` of them.
    async fn recent_cancellations(&self, user_id: &UserId, limit: i64) -> Result<Vec<Order>, BrokerDbError>;

    async fn fetch_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, BrokerDbError>;

    async fn fetch_ledger_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<crate::db_types::LedgerEntry>, BrokerDbError>;

    // ----------------------------------------- Catalog -------------------------------------------------------------

    /// The site-wide maintenance flag (server 0).
    async fn site_maintenance(&self) -> Result<bool, BrokerDbError>;

    async fn fetch_server(&self, server: ServerId) -> Result<Option<ServerEntry>, BrokerDbError>;

    async fn fetch_service(&self, service: &str, server: ServerId) -> Result<Option<ServiceEntry>, BrokerDbError>;

    async fn fetch_discounts(
        &self,
        user_id: &UserId,
        service: &str,
        server: ServerId,
    ) -> Result<DiscountSet, BrokerDbError>;

    /// The configured vendor slots, suitable for building the provider registry at startup. Server 0 is excluded.
    async fn provider_profiles(&self) -> Result<Vec<ProviderProfile>, BrokerDbError>;

    /// Whether the named abuse rule has been globally disarmed by an operator.
    async fn abuse_rule_disarmed(&self, rule: &str) -> Result<bool, BrokerDbError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), BrokerDbError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum BrokerDbError {
    #[error("We have an internal database problem (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("User {0} does not exist")]
    UserNotFound(UserId),
    #[error("User {0} has insufficient funds")]
    InsufficientFunds(UserId),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderNotFound(i64),
}

impl From<sqlx::Error> for BrokerDbError {
    fn from(e: sqlx::Error) -> Self {
        BrokerDbError::DatabaseError(e.to_string())
    }
}
