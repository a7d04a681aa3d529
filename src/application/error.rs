use thiserror::Error;

use crate::domain::{Cents, WalletId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance in wallet {wallet_id}: balance {balance}, required {required}")]
    InsufficientBalance {
        wallet_id: WalletId,
        balance: Cents,
        required: Cents,
    },

    #[error("User not found with this email: {0}")]
    RecipientNotFound(String),

    #[error("Recipient has no wallet: {0}")]
    RecipientHasNoWallet(String),

    #[error("Cannot convert between wallets of different users")]
    CrossUserConversion,

    #[error("No exchange rate available for {from} -> {to}")]
    RateUnavailable { from: String, to: String },

    #[error("Cannot transfer to yourself; use a conversion between your own wallets")]
    SelfTransfer,

    #[error("Source and destination wallet are the same: {0}")]
    SameWallet(WalletId),

    #[error("Email already registered: {0}")]
    EmailAlreadyExists(String),

    #[error("User already has a {0} wallet")]
    WalletAlreadyExists(String),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Payment not successful (status: {0})")]
    PaymentNotSucceeded(String),

    #[error("Payment already processed: {0}")]
    DuplicatePayment(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Machine-readable kind, independent of the message.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            AppError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            AppError::RecipientNotFound(_) => ErrorKind::RecipientNotFound,
            AppError::RecipientHasNoWallet(_) => ErrorKind::RecipientHasNoWallet,
            AppError::CrossUserConversion => ErrorKind::CrossUserConversion,
            AppError::RateUnavailable { .. } => ErrorKind::RateUnavailable,
            AppError::SelfTransfer => ErrorKind::SelfTransfer,
            AppError::SameWallet(_) => ErrorKind::SameWallet,
            AppError::EmailAlreadyExists(_) => ErrorKind::EmailAlreadyExists,
            AppError::WalletAlreadyExists(_) => ErrorKind::WalletAlreadyExists,
            AppError::UnsupportedCurrency(_) => ErrorKind::UnsupportedCurrency,
            AppError::PaymentNotSucceeded(_) => ErrorKind::PaymentNotSucceeded,
            AppError::DuplicatePayment(_) => ErrorKind::DuplicatePayment,
            AppError::Database(_) => ErrorKind::Database,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidAmount,
    InsufficientBalance,
    RecipientNotFound,
    RecipientHasNoWallet,
    CrossUserConversion,
    RateUnavailable,
    SelfTransfer,
    SameWallet,
    EmailAlreadyExists,
    WalletAlreadyExists,
    UnsupportedCurrency,
    PaymentNotSucceeded,
    DuplicatePayment,
    Database,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidAmount => "INVALID_AMOUNT",
            ErrorKind::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorKind::RecipientNotFound => "RECIPIENT_NOT_FOUND",
            ErrorKind::RecipientHasNoWallet => "RECIPIENT_HAS_NO_WALLET",
            ErrorKind::CrossUserConversion => "CROSS_USER_CONVERSION",
            ErrorKind::RateUnavailable => "RATE_UNAVAILABLE",
            ErrorKind::SelfTransfer => "SELF_TRANSFER",
            ErrorKind::SameWallet => "SAME_WALLET",
            ErrorKind::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            ErrorKind::WalletAlreadyExists => "WALLET_ALREADY_EXISTS",
            ErrorKind::UnsupportedCurrency => "UNSUPPORTED_CURRENCY",
            ErrorKind::PaymentNotSucceeded => "PAYMENT_NOT_SUCCEEDED",
            ErrorKind::DuplicatePayment => "DUPLICATE_PAYMENT",
            ErrorKind::Database => "DATABASE",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
