use log::*;
use smb_common::{Money, UserId};

use crate::{
    broker_api::errors::BrokerError,
    db_types::{LedgerEntry, Order, User},
    traits::{BrokerDatabase, LedgerSummary},
};

/// The read-side account surface: wallet balances, order history and the ledger audit. Everything here is a plain
/// database read (or, for registration, an idempotent upsert), so none of it runs through the operation queues.
#[derive(Debug, Clone)]
pub struct AccountApi<B> {
    db: B,
}

impl<B> AccountApi<B>
where B: BrokerDatabase
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Creates the account if it does not exist yet. Re-registering an existing user changes nothing and returns
    /// the stored record.
    pub async fn register_user(&self, user_id: &UserId, starting_balance: Money) -> Result<User, BrokerError> {
        let user = self.db.upsert_user(user_id, starting_balance).await?;
        debug!("📒️ User {user_id} registered with balance {}", user.balance);
        Ok(user)
    }

    pub async fn user(&self, user_id: &UserId) -> Result<User, BrokerError> {
        self.db.fetch_user(user_id).await?.ok_or_else(|| BrokerError::UserNotFound(user_id.clone()))
    }

    pub async fn balance(&self, user_id: &UserId) -> Result<Money, BrokerError> {
        let user = self.user(user_id).await?;
        Ok(user.balance)
    }

    pub async fn order_history(&self, user_id: &UserId) -> Result<Vec<Order>, BrokerError> {
        let orders = self.db.fetch_orders_for_user(user_id).await?;
        Ok(orders)
    }

    pub async fn ledger(&self, user_id: &UserId) -> Result<Vec<LedgerEntry>, BrokerError> {
        let entries = self.db.fetch_ledger_for_user(user_id).await?;
        Ok(entries)
    }

    /// Reconciles the wallet against the ledger: the balance must equal the starting balance plus the signed
    /// ledger entries plus the confirmed top-ups. A mismatch is reported, never auto-corrected; it means a bug or
    /// manual tampering and a human needs to look at it.
    pub async fn verify_ledger(&self, user_id: &UserId) -> Result<LedgerSummary, BrokerError> {
        let summary = self.db.ledger_summary(user_id).await?;
        if !summary.is_consistent() {
            error!(
                "📒️ Ledger mismatch for user {user_id}: balance {} vs starting {} + ledger {} + top-ups {}",
                summary.balance, summary.starting_balance, summary.ledger_total, summary.top_up_total
            );
            return Err(BrokerError::LedgerMismatch(user_id.clone()));
        }
        Ok(summary)
    }
}
