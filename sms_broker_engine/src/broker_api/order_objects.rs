use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smb_common::Money;

/// The result of a successful acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberLease {
    pub order_id: i64,
    pub phone_number: String,
    /// The resolved price that was debited.
    pub price: Money,
    pub expires_at: DateTime<Utc>,
}

/// The result of an OTP poll. `otp` is empty while the code has not arrived yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpPoll {
    pub otp: String,
}

impl OtpPoll {
    pub fn waiting() -> Self {
        Self { otp: String::new() }
    }

    pub fn received(otp: String) -> Self {
        Self { otp }
    }

    pub fn is_waiting(&self) -> bool {
        self.otp.is_empty()
    }
}

/// The result of a successful cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResult {
    pub refunded: bool,
}

/// What one sweep pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Active orders whose deadline fell within the sweep horizon.
    pub examined: usize,
    /// Orders retired (Expired or Finished) during this pass.
    pub retired: usize,
    /// Orders handed a deferred cancel task firing closer to their deadline.
    pub deferred: usize,
    /// Upstream cancels that failed; the orders stay Active for the next pass.
    pub failed: usize,
}

/// The result of confirming a top-up. `credited` is false when the transaction id was already processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUpResult {
    pub credited: bool,
    pub balance: Money,
}
