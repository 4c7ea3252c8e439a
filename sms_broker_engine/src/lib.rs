//! SMS Broker Engine
//!
//! The broker engine leases short-lived virtual phone numbers from third-party SMS/OTP vendors, charges a wallet
//! balance per acquisition, waits for the verification code, and allows time-boxed cancellation with a refund.
//! This library contains the core logic of the broker. It is transport-agnostic: the HTTP layer, auth and admin
//! tooling live elsewhere and consume the API exposed here.
//!
//! The library is divided into three main sections:
//! 1. Database management and control. SQLite is the supported backend. You should never need to access the
//!    database directly; use the public API instead. The exception is the data types used in the database, which
//!    are defined in [`db_types`] and are public.
//! 2. The broker public API. [`OrderFlowApi`] drives the order state machine (acquire, OTP
//!    polling, cancellation, expiry sweeping) and [`AccountApi`] provides the read-side wallet and history surface.
//!    Backends implement [`BrokerDatabase`] to plug in.
//! 3. Concurrency plumbing: the [`queue::SingleFlightQueue`] serializes same-class operations strictly FIFO, and
//!    the [`sweeper`] runs the periodic expiry pass.
//!
//! The engine also emits events (order created, OTP received, order annulled, user blocked) through a simple actor
//! framework so that notifier integrations can hook in without blocking the order flow.
mod broker_api;
mod db;

pub mod db_types;
pub mod events;
pub mod queue;
pub mod sweeper;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use db::traits;
pub use db::traits::{BrokerDatabase, BrokerDbError, DiscountSet, LedgerSummary};
pub use broker_api::{
    accounts_api::AccountApi,
    config::BrokerConfig,
    errors::BrokerError,
    order_flow_api::OrderFlowApi,
    order_objects::{CancelResult, NumberLease, OtpPoll, SweepReport, TopUpResult},
    pricing::resolve_price,
};
