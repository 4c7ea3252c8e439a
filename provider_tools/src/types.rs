use serde::{Deserialize, Serialize};
use smb_common::Money;

/// Parameters for an acquire call. `max_price` is only consulted by vendors whose API supports a price cap
/// (SmsHub's `maxPrice` query parameter).
#[derive(Debug, Clone)]
pub struct AcquireRequest {
    pub service_code: String,
    pub max_price: Option<Money>,
}

impl AcquireRequest {
    pub fn new<S: Into<String>>(service_code: S) -> Self {
        Self { service_code: service_code.into(), max_price: None }
    }

    pub fn with_max_price(mut self, price: Money) -> Self {
        self.max_price = Some(price);
        self
    }
}

/// A freshly leased number, normalized across vendors. `number_id` is the vendor's activation id and is the handle
/// for all subsequent poll/cancel calls. `phone_number` has the country prefix already stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acquisition {
    pub number_id: String,
    pub phone_number: String,
}

/// Normalized result of a cancel call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The vendor released the number.
    Cancelled,
    /// The vendor reports the activation was already cancelled (or never active). Treated as success by callers
    /// that only need the number gone.
    AlreadyCancelled,
    /// The vendor refused to cancel because an SMS already arrived. The caller must finish the order instead.
    OtpReceived,
}

impl CancelOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::AlreadyCancelled)
    }
}

/// Strip the Indian country prefix from a vendor-returned number. Vendors disagree on the shape: some return
/// `+91xxxxxxxxxx`, some `91xxxxxxxxxx`, some the bare number.
pub(crate) fn strip_country_prefix(number: &str) -> String {
    let number = number.trim();
    if let Some(rest) = number.strip_prefix("+91") {
        rest.to_string()
    } else if number.len() > 10 {
        number.strip_prefix("91").unwrap_or(number).to_string()
    } else {
        number.to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn country_prefix_variants() {
        assert_eq!(strip_country_prefix("+919876543210"), "9876543210");
        assert_eq!(strip_country_prefix("919876543210"), "9876543210");
        assert_eq!(strip_country_prefix("9876543210"), "9876543210");
        // a 10-digit number starting with 91 must not be mangled
        assert_eq!(strip_country_prefix("9198765432"), "9198765432");
    }
}
