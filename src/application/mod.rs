//! Application layer: the ledger engine and what it needs around it.

pub mod error;
mod locks;
mod notify;
pub mod reporting;
mod service;

pub use error::*;
pub use locks::WalletLocks;
pub use notify::*;
pub use reporting::{DailyFlow, MonthlyReport, UserSummary, WalletStats};
pub use service::*;
