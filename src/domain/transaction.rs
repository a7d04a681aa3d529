use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, WalletId};

pub type TransactionId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money entering the wallet (incoming transfer, conversion leg, card deposit)
    Deposit,
    /// Money leaving the system
    Withdrawal,
    /// Outgoing transfer to another user
    Transfer,
    /// Outgoing leg of a conversion between a user's own wallets
    Conversion,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Conversion => "CONVERSION",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DEPOSIT" => Some(TransactionType::Deposit),
            "WITHDRAWAL" => Some(TransactionType::Withdrawal),
            "TRANSFER" => Some(TransactionType::Transfer),
            "CONVERSION" => Some(TransactionType::Conversion),
            _ => None,
        }
    }

    /// Money sent away from the owner (counts as "sent" in reports).
    pub fn is_outgoing(&self) -> bool {
        matches!(self, TransactionType::Transfer | TransactionType::Withdrawal)
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Pending,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SUCCESS" => Some(TransactionStatus::Success),
            "PENDING" => Some(TransactionStatus::Pending),
            "FAILED" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable record of a single balance-affecting event on one wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Monotonically increasing sequence number for ordering
    pub sequence: i64,
    pub wallet_id: WalletId,
    pub kind: TransactionType,
    /// Magnitude moved into or out of the wallet, in its currency (always positive)
    pub amount_cents: Cents,
    pub description: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    /// Reference of the external payment that funded a deposit
    pub payment_ref: Option<String>,
}

impl Transaction {
    /// Create a successful transaction. Sequence number must be assigned by the repository.
    pub fn new(
        wallet_id: WalletId,
        kind: TransactionType,
        amount_cents: Cents,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        assert!(amount_cents > 0, "Transaction amount must be positive");
        Self {
            id: Uuid::new_v4(),
            sequence: 0, // Will be set by repository
            wallet_id,
            kind,
            amount_cents,
            description: description.into(),
            status: TransactionStatus::Success,
            created_at,
            payment_ref: None,
        }
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_payment_ref(mut self, payment_ref: impl Into<String>) -> Self {
        self.payment_ref = Some(payment_ref.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_roundtrip() {
        for kind in [
            TransactionType::Deposit,
            TransactionType::Withdrawal,
            TransactionType::Transfer,
            TransactionType::Conversion,
        ] {
            assert_eq!(TransactionType::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionType::from_str("refund"), None);
    }

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        assert_eq!(
            TransactionStatus::from_str("pending"),
            Some(TransactionStatus::Pending)
        );
        assert_eq!(TransactionStatus::from_str("unknown"), None);
    }

    #[test]
    fn test_new_transaction_defaults() {
        let tx = Transaction::new(
            Uuid::new_v4(),
            TransactionType::Deposit,
            2500,
            "Card Deposit",
            Utc::now(),
        )
        .with_payment_ref("pi_123");

        assert_eq!(tx.status, TransactionStatus::Success);
        assert_eq!(tx.payment_ref.as_deref(), Some("pi_123"));
        assert_eq!(tx.sequence, 0);
    }

    #[test]
    #[should_panic(expected = "Transaction amount must be positive")]
    fn test_transaction_requires_positive_amount() {
        Transaction::new(
            Uuid::new_v4(),
            TransactionType::Transfer,
            0,
            "nothing",
            Utc::now(),
        );
    }

    #[test]
    fn test_outgoing_types() {
        assert!(TransactionType::Transfer.is_outgoing());
        assert!(TransactionType::Withdrawal.is_outgoing());
        assert!(!TransactionType::Deposit.is_outgoing());
        assert!(!TransactionType::Conversion.is_outgoing());
    }
}
