mod repository;

pub use repository::*;

/// SQL migration for users, wallets and transactions
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

/// SQL migration for the notification inbox
pub const MIGRATION_002_NOTIFICATIONS: &str = include_str!("migrations/002_notifications.sql");
