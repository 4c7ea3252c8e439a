mod ids;
mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use ids::{ServerId, UserId};
pub use money::{Money, MoneyConversionError};
pub use secret::Secret;
