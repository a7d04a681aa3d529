pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod io;
pub mod logging;
pub mod rates;
pub mod storage;

pub use application::{AppError, ErrorKind, LedgerService};
pub use domain::*;
pub use rates::ExchangeRateProvider;
pub use storage::Repository;
