use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use provider_tools::ProviderCode;
use serde::{Deserialize, Serialize};
use smb_common::{Money, Secret, ServerId, UserId};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------   OrderStatusType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The number is leased and waiting for an OTP. The only non-terminal state.
    Active,
    /// An OTP arrived. Terminal; no refund.
    Finished,
    /// Cancelled by the user (or upstream). Terminal; refunded.
    Cancelled,
    /// Auto-cancelled by the sweeper at end of life. Terminal; refunded.
    Expired,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatusType::Active)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Active => write!(f, "Active"),
            OrderStatusType::Finished => write!(f, "Finished"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
            OrderStatusType::Expired => write!(f, "Expired"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Finished" => Ok(Self::Finished),
            "Cancelled" => Ok(Self::Cancelled),
            "Expired" => Ok(Self::Expired),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: UserId,
    pub service: String,
    pub server: ServerId,
    pub price: Money,
    /// The activation id assigned by the vendor. Opaque; used for poll and cancel calls.
    pub number_id: String,
    pub phone_number: String,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Order {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    pub fn time_left(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }
}

//--------------------------------------       NewOrder       --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub service: String,
    pub server: ServerId,
    /// The resolved price. The wallet is debited by exactly this amount when the order is stored.
    pub price: Money,
    pub number_id: String,
    pub phone_number: String,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------      EntryKind       --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum EntryKind {
    Debit,
    Refund,
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Debit => write!(f, "Debit"),
            EntryKind::Refund => write!(f, "Refund"),
        }
    }
}

//--------------------------------------     LedgerEntry      --------------------------------------------------------
/// Append-only record of a wallet movement tied to an order. Debits carry a negative amount, refunds a positive
/// one, so the entries for a user sum to the wallet delta attributable to orders.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub order_id: i64,
    pub user_id: UserId,
    pub amount: Money,
    pub kind: EntryKind,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      OtpRecord       --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OtpRecord {
    pub id: i64,
    pub order_id: i64,
    pub otp: String,
    pub received_at: DateTime<Utc>,
}

//--------------------------------------        User          --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub balance: Money,
    /// The balance the account opened with. Ledger reconciliation is relative to this value.
    pub starting_balance: Money,
    pub blocked: bool,
    pub blocked_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     ServerEntry      --------------------------------------------------------
/// One configured vendor slot. Server 0 is special: it carries no provider and its `maintenance` flag takes the
/// whole site down.
#[derive(Debug, Clone)]
pub struct ServerEntry {
    pub server: ServerId,
    pub provider: Option<ProviderCode>,
    pub api_key: Secret<String>,
    pub maintenance: bool,
}

//--------------------------------------     ServiceEntry     --------------------------------------------------------
/// A purchasable service on a given server: the vendor-facing service code and the base price before discounts.
#[derive(Debug, Clone, FromRow)]
pub struct ServiceEntry {
    pub service: String,
    pub server: ServerId,
    pub code: String,
    pub price: Money,
}

#[cfg(test)]
mod test {
    use super::*;

    // An unrecognised status must be an error, never quietly read as Active. A terminal order misread as Active
    // would be eligible for a second refund.
    #[test]
    fn unknown_status_does_not_parse() {
        assert_eq!("Finished".parse::<OrderStatusType>().unwrap(), OrderStatusType::Finished);
        let err = "Bogus".parse::<OrderStatusType>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid order status: Bogus");
    }
}
