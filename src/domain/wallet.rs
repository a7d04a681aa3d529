use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, CurrencyInfo, UserId};

pub type WalletId = Uuid;

/// A per-user, per-currency balance container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub currency: String,
    pub symbol: String,
    pub name: String,
    pub flag: String,
    /// Current balance in cents. Never negative.
    pub balance_cents: Cents,
    /// Display-only daily movement metric.
    pub daily_change: f64,
    /// Creation order assigned by the repository; the lowest sequence of a
    /// user is their default wallet.
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    /// Create an empty wallet for `user_id` in the given currency.
    /// Sequence number must be assigned by the repository.
    pub fn new(user_id: UserId, currency: &CurrencyInfo) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            currency: currency.code.to_string(),
            symbol: currency.symbol.to_string(),
            name: currency.wallet_name.to_string(),
            flag: currency.flag.to_string(),
            balance_cents: 0,
            daily_change: 0.0,
            sequence: 0, // Will be set by repository
            created_at: Utc::now(),
        }
    }

    pub fn has_funds(&self, amount_cents: Cents) -> bool {
        self.balance_cents >= amount_cents
    }
}
