mod money;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError, Percent, CURRENCY_CODE, MINOR_UNITS_PER_MAJOR};
pub use secret::Secret;
