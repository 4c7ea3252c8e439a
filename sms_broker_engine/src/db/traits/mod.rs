mod broker_database;
mod data_objects;

pub use broker_database::{BrokerDatabase, BrokerDbError};
pub use data_objects::{DiscountSet, LedgerSummary};
