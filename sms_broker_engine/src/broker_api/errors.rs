use provider_tools::ProviderApiError;
use smb_common::UserId;
use thiserror::Error;

use crate::{queue::QueueError, traits::BrokerDbError};

/// The typed error surface of the broker engine. Callers see a stable kind, never vendor-specific text.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    #[error("No numbers are available for this service right now")]
    NoStock,
    #[error("The wallet balance does not cover the resolved price")]
    LowBalance,
    #[error("The service is under maintenance")]
    Maintenance,
    #[error("The user is blocked")]
    Blocked,
    #[error("The requested user {0} does not exist")]
    UserNotFound(UserId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(i64),
    #[error("The order cannot be cancelled yet")]
    TooEarlyToCancel,
    #[error("An OTP has already been received for this order")]
    OtpAlreadyReceived,
    #[error("The upstream vendor call failed: {0}")]
    UpstreamError(String),
    #[error("We have an internal database problem: {0}")]
    DatabaseError(String),
    #[error("The operation queue is no longer running")]
    QueueClosed,
    #[error("Ledger reconciliation failed for user {0}: the wallet balance does not match the ledger")]
    LedgerMismatch(UserId),
}

impl From<BrokerDbError> for BrokerError {
    fn from(e: BrokerDbError) -> Self {
        match e {
            BrokerDbError::DatabaseError(s) => BrokerError::DatabaseError(s),
            BrokerDbError::UserNotFound(u) => BrokerError::UserNotFound(u),
            BrokerDbError::InsufficientFunds(_) => BrokerError::LowBalance,
            BrokerDbError::OrderNotFound(id) => BrokerError::OrderNotFound(id),
        }
    }
}

impl From<ProviderApiError> for BrokerError {
    fn from(e: ProviderApiError) -> Self {
        match e {
            ProviderApiError::NoStock => BrokerError::NoStock,
            ProviderApiError::LowBalance => BrokerError::LowBalance,
            ProviderApiError::OtpAlreadyReceived => BrokerError::OtpAlreadyReceived,
            ProviderApiError::AlreadyCancelled => BrokerError::UpstreamError("The vendor has already released this number".to_string()),
            ProviderApiError::UpstreamError(s) => BrokerError::UpstreamError(s),
            ProviderApiError::Initialization(s) => BrokerError::UpstreamError(s),
        }
    }
}

impl From<QueueError> for BrokerError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Closed => BrokerError::QueueClosed,
            QueueError::JobFailed => BrokerError::QueueClosed,
        }
    }
}
