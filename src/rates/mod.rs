//! Exchange rates: where they come from and how they are cached.
//!
//! All rates are quoted as units of a currency per one unit of
//! [`BASE_CURRENCY`](crate::domain::BASE_CURRENCY).

mod provider;
mod source;

use std::collections::HashMap;

use rust_decimal::Decimal;

pub use provider::*;
pub use source::*;

/// Currency code -> rate against the base currency.
pub type RateTable = HashMap<String, Decimal>;
