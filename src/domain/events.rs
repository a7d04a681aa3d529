use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, UserId, format_cents};

pub type NotificationId = Uuid;

/// Domain events emitted after a ledger mutation commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEvent {
    TransferSent {
        user_id: UserId,
        recipient_name: String,
        amount_cents: Cents,
        currency: String,
    },
    TransferReceived {
        user_id: UserId,
        sender_name: String,
        amount_cents: Cents,
        currency: String,
    },
    ConversionCompleted {
        user_id: UserId,
        from_amount_cents: Cents,
        from_currency: String,
        to_amount_cents: Cents,
        to_currency: String,
    },
    DepositCredited {
        user_id: UserId,
        amount_cents: Cents,
        currency: String,
    },
}

impl LedgerEvent {
    /// The user this event is addressed to.
    pub fn user_id(&self) -> UserId {
        match self {
            LedgerEvent::TransferSent { user_id, .. }
            | LedgerEvent::TransferReceived { user_id, .. }
            | LedgerEvent::ConversionCompleted { user_id, .. }
            | LedgerEvent::DepositCredited { user_id, .. } => *user_id,
        }
    }

    /// Stable notification kind code.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::TransferSent { .. } => "TRANSFER_SENT",
            LedgerEvent::TransferReceived { .. } => "TRANSFER_RECEIVED",
            LedgerEvent::ConversionCompleted { .. } => "CONVERSION",
            LedgerEvent::DepositCredited { .. } => "DEPOSIT",
        }
    }

    /// Amount and currency the notification is denominated in.
    pub fn amount(&self) -> (Cents, &str) {
        match self {
            LedgerEvent::TransferSent {
                amount_cents,
                currency,
                ..
            }
            | LedgerEvent::TransferReceived {
                amount_cents,
                currency,
                ..
            }
            | LedgerEvent::DepositCredited {
                amount_cents,
                currency,
                ..
            } => (*amount_cents, currency),
            LedgerEvent::ConversionCompleted {
                to_amount_cents,
                to_currency,
                ..
            } => (*to_amount_cents, to_currency),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            LedgerEvent::TransferSent { .. } => "Money Sent",
            LedgerEvent::TransferReceived { .. } => "Money Received",
            LedgerEvent::ConversionCompleted { .. } => "Currency Converted",
            LedgerEvent::DepositCredited { .. } => "Deposit Received",
        }
    }

    pub fn message(&self) -> String {
        match self {
            LedgerEvent::TransferSent {
                recipient_name,
                amount_cents,
                currency,
                ..
            } => format!(
                "You sent {} {} to {}",
                currency,
                format_cents(*amount_cents),
                recipient_name
            ),
            LedgerEvent::TransferReceived {
                sender_name,
                amount_cents,
                currency,
                ..
            } => format!(
                "You received {} {} from {}",
                currency,
                format_cents(*amount_cents),
                sender_name
            ),
            LedgerEvent::ConversionCompleted {
                from_amount_cents,
                from_currency,
                to_amount_cents,
                to_currency,
                ..
            } => format!(
                "You converted {} {} to {} {}",
                from_currency,
                format_cents(*from_amount_cents),
                to_currency,
                format_cents(*to_amount_cents)
            ),
            LedgerEvent::DepositCredited {
                amount_cents,
                currency,
                ..
            } => format!(
                "Your wallet has been credited with {} {}",
                currency,
                format_cents(*amount_cents)
            ),
        }
    }
}

/// A user-facing inbox entry rendered from a [`LedgerEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub amount_cents: Cents,
    pub currency: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn from_event(event: &LedgerEvent) -> Self {
        let (amount_cents, currency) = event.amount();
        Self {
            id: Uuid::new_v4(),
            user_id: event.user_id(),
            kind: event.kind().to_string(),
            title: event.title().to_string(),
            message: event.message(),
            amount_cents,
            currency: currency.to_string(),
            is_read: false,
            created_at: Utc::now(),
        }
    }
}
