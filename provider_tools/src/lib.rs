//! Vendor integrations for the SMS number broker.
//!
//! Nine upstream SMS/OTP vendors are normalized behind the [`ProviderAdapter`] trait. Five of them speak the shared
//! `handler_api.php` colon-delimited grammar and are served by one generic [`stubs::StubsAdapter`] parameterized per
//! vendor; the remaining vendors (5sim, SMS-Man, PhantomUnion) each get their own client. Vendor-specific tokens
//! never leave this crate: callers only ever see [`Acquisition`], an optional OTP, [`CancelOutcome`] or a
//! [`ProviderApiError`] kind.
mod adapter;
mod config;
mod error;
mod fivesim;
mod phantom;
mod smsman;
mod stubs;
mod types;

pub use adapter::{ProviderAdapter, ProviderRegistry};
pub use async_trait::async_trait;
pub use config::{ProviderCode, ProviderProfile};
pub use error::ProviderApiError;
pub use fivesim::FiveSimApi;
pub use phantom::PhantomApi;
pub use smsman::SmsManApi;
pub use stubs::{StubsAdapter, StubsVendor};
pub use types::{AcquireRequest, Acquisition, CancelOutcome};
