use serde::{Deserialize, Serialize};
use smb_common::UserId;

use crate::db_types::{Order, OrderStatusType};

/// A number was leased and the wallet debited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// The first OTP arrived for an order. Fired once per order; duplicate codes do not re-fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpReceivedEvent {
    pub order: Order,
    pub otp: String,
}

impl OtpReceivedEvent {
    pub fn new(order: Order, otp: String) -> Self {
        Self { order, otp }
    }
}

/// An order left the Active state without finishing: user cancel or sweeper expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
    pub refunded: bool,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order, refunded: bool) -> Self {
        let status = order.status;
        Self { order, status, refunded }
    }
}

/// The abuse detector blocked a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBlockedEvent {
    pub user_id: UserId,
    pub reason: String,
}

impl UserBlockedEvent {
    pub fn new(user_id: UserId, reason: impl Into<String>) -> Self {
        Self { user_id, reason: reason.into() }
    }
}
