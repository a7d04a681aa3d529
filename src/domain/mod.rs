pub mod currency;
mod events;
mod ledger;
mod money;
mod transaction;
mod user;
mod wallet;

pub use currency::{BASE_CURRENCY, CurrencyInfo};
pub use events::*;
pub use ledger::*;
pub use money::*;
pub use transaction::*;
pub use user::*;
pub use wallet::*;
