use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::currency::{self, STARTER_CURRENCIES, normalize_code};
use crate::domain::{
    Cents, LedgerEvent, Movement, Notification, NotificationId, Transaction, TransactionId, User,
    UserId, Wallet, WalletId,
};
use crate::rates::{ExchangeRateProvider, RateTable, convert_with, exchange_rate_with};
use crate::storage::{CommitOutcome, Repository};

use super::reporting::{self, MonthlyReport, UserSummary, WalletStats};
use super::{AppError, NotificationHook, TracingNotifier, WalletLocks};

/// Payment status the gateway reports for a completed charge.
pub const PAYMENT_SUCCEEDED: &str = "succeeded";

/// Application service providing the ledger operations.
/// This is the primary interface for any client (CLI, API, tests).
pub struct LedgerService {
    repo: Arc<Repository>,
    rates: Arc<ExchangeRateProvider>,
    locks: WalletLocks,
    notifier: Arc<dyn NotificationHook>,
}

/// A newly registered user and their starter wallets.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub user: User,
    pub wallets: Vec<Wallet>,
}

/// Result of a transfer to another user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    /// Id of the sender's outflow record
    pub transaction_id: TransactionId,
    pub sender_balance: Cents,
    pub amount_sent: Cents,
    pub amount_received: Cents,
    pub from_currency: String,
    pub to_currency: String,
    pub recipient_name: String,
}

/// Result of a conversion between two wallets of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionReceipt {
    pub transaction_id: TransactionId,
    pub debited: Cents,
    pub credited: Cents,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: Decimal,
    pub from_balance: Cents,
    pub to_balance: Cents,
}

/// Result of crediting a deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositReceipt {
    pub transaction_id: TransactionId,
    pub wallet_id: WalletId,
    pub amount: Cents,
    pub currency: String,
    pub new_balance: Cents,
}

/// Outcome of looking up a transfer recipient. A missing recipient is a
/// normal answer here, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecipientLookup {
    Found {
        name: String,
        wallet_id: WalletId,
        currency: String,
        symbol: String,
        /// One unit of the sender's currency in the recipient's currency
        exchange_rate: Decimal,
    },
    NotFound {
        reason: String,
    },
}

/// Payment outcome reported by the card payment collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub status: String,
    pub amount: Cents,
    pub payment_reference: String,
}

impl LedgerService {
    /// Create a new ledger service. Events are logged until a different
    /// hook is installed with [`LedgerService::with_notifier`].
    pub fn new(repo: impl Into<Arc<Repository>>, rates: Arc<ExchangeRateProvider>) -> Self {
        Self {
            repo: repo.into(),
            rates,
            locks: WalletLocks::new(),
            notifier: Arc::new(TracingNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationHook>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Initialize a new database at the given path.
    pub async fn init(
        database_path: &str,
        rates: Arc<ExchangeRateProvider>,
    ) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo, rates))
    }

    /// Connect to an existing database.
    pub async fn connect(
        database_path: &str,
        rates: Arc<ExchangeRateProvider>,
    ) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo, rates))
    }

    /// Shared handle to the underlying store.
    pub fn repository(&self) -> Arc<Repository> {
        Arc::clone(&self.repo)
    }

    pub fn rate_provider(&self) -> &Arc<ExchangeRateProvider> {
        &self.rates
    }

    // ========================
    // User operations
    // ========================

    /// Register a user with the starter wallets (USD, then EUR).
    pub async fn register_user(
        &self,
        name: &str,
        email: &str,
        phone: Option<String>,
        country: Option<String>,
    ) -> Result<Registration, AppError> {
        if self.repo.get_user_by_email(email).await?.is_some() {
            return Err(AppError::EmailAlreadyExists(email.trim().to_string()));
        }

        let mut user = User::new(name.trim(), email);
        user.phone = phone.filter(|p| !p.trim().is_empty());
        user.country = country.filter(|c| !c.trim().is_empty());

        let mut wallets: Vec<Wallet> = STARTER_CURRENCIES
            .iter()
            .filter_map(|code| currency::lookup(code))
            .map(|info| Wallet::new(user.id, info))
            .collect();

        self.repo.save_user_with_wallets(&user, &mut wallets).await?;
        info!(user_id = %user.id, email = %user.email, "user registered");

        Ok(Registration { user, wallets })
    }

    pub async fn get_user(&self, id: UserId) -> Result<User, AppError> {
        self.repo
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found("User", id))
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<User, AppError> {
        self.repo
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::not_found("User", email.trim()))
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.repo.list_users().await?)
    }

    // ========================
    // Wallet operations
    // ========================

    /// Open a wallet in `currency` for a user, optionally funded with an
    /// initial deposit.
    pub async fn create_wallet(
        &self,
        user_id: UserId,
        currency: &str,
        initial_deposit: Cents,
    ) -> Result<Wallet, AppError> {
        let code = normalize_code(currency);
        let info =
            currency::lookup(&code).ok_or_else(|| AppError::UnsupportedCurrency(code.clone()))?;

        if initial_deposit < 0 {
            return Err(AppError::InvalidAmount(
                "Initial deposit cannot be negative".to_string(),
            ));
        }

        let user = self.get_user(user_id).await?;
        if self
            .repo
            .get_wallet_for_currency(user.id, &code)
            .await?
            .is_some()
        {
            return Err(AppError::WalletAlreadyExists(code));
        }

        let mut wallet = Wallet::new(user.id, info);
        self.repo.save_wallet(&mut wallet).await?;
        info!(
            wallet_id = %wallet.id,
            user_id = %user.id,
            currency = %wallet.currency,
            "wallet created"
        );

        if initial_deposit > 0 {
            let receipt = self
                .credit_deposit(wallet.id, initial_deposit, "Initial deposit", None)
                .await?;
            wallet.balance_cents = receipt.new_balance;
        }

        Ok(wallet)
    }

    /// Get a wallet by id.
    pub async fn get_wallet(&self, id: WalletId) -> Result<Wallet, AppError> {
        self.repo
            .get_wallet(id)
            .await?
            .ok_or_else(|| AppError::not_found("Wallet", id))
    }

    /// A user's wallets in creation order.
    pub async fn list_wallets(&self, user_id: UserId) -> Result<Vec<Wallet>, AppError> {
        Ok(self.repo.list_wallets_for_user(user_id).await?)
    }

    /// The first wallet ever created for a user.
    pub async fn default_wallet(&self, user_id: UserId) -> Result<Option<Wallet>, AppError> {
        Ok(self.repo.default_wallet_for_user(user_id).await?)
    }

    // ========================
    // Ledger operations
    // ========================

    /// Send `amount` (in the sender wallet's currency) to the default wallet
    /// of the user registered under `recipient_email`.
    pub async fn transfer(
        &self,
        sender_wallet_id: WalletId,
        recipient_email: &str,
        amount: Cents,
        note: Option<&str>,
    ) -> Result<TransferReceipt, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let sender_wallet = self.get_wallet(sender_wallet_id).await?;
        Self::ensure_funds(&sender_wallet, amount)?;

        let recipient = self
            .repo
            .get_user_by_email(recipient_email)
            .await?
            .ok_or_else(|| AppError::RecipientNotFound(recipient_email.trim().to_string()))?;
        let recipient_wallet = self
            .repo
            .default_wallet_for_user(recipient.id)
            .await?
            .ok_or_else(|| AppError::RecipientHasNoWallet(recipient.email.clone()))?;

        if recipient.id == sender_wallet.user_id {
            return Err(AppError::SelfTransfer);
        }

        let rates = self.rates.rates().await;
        let amount_received = Self::price(
            &rates,
            amount,
            &sender_wallet.currency,
            &recipient_wallet.currency,
        )?;

        let sender = self.get_user(sender_wallet.user_id).await?;

        let guards = self
            .locks
            .lock(&[sender_wallet.id, recipient_wallet.id])
            .await;
        let sender_wallet = self.get_wallet(sender_wallet.id).await?;
        Self::ensure_funds(&sender_wallet, amount)?;

        let mut movement = Movement::transfer(
            &sender_wallet,
            &sender.name,
            &recipient_wallet,
            &recipient.name,
            amount,
            amount_received,
            note,
            Utc::now(),
        );
        let balances = self.commit(&mut movement).await?;
        drop(guards);

        let transaction_id = movement
            .primary_transaction_id()
            .ok_or_else(|| anyhow::anyhow!("transfer produced no records"))?;
        let sender_balance = balance_of(&balances, sender_wallet.id)?;

        info!(
            transaction_id = %transaction_id,
            from_wallet = %sender_wallet.id,
            to_wallet = %recipient_wallet.id,
            amount_sent = amount,
            amount_received,
            "transfer committed"
        );

        self.notifier.notify(LedgerEvent::TransferSent {
            user_id: sender.id,
            recipient_name: recipient.name.clone(),
            amount_cents: amount,
            currency: sender_wallet.currency.clone(),
        });
        self.notifier.notify(LedgerEvent::TransferReceived {
            user_id: recipient.id,
            sender_name: sender.name.clone(),
            amount_cents: amount_received,
            currency: recipient_wallet.currency.clone(),
        });

        Ok(TransferReceipt {
            transaction_id,
            sender_balance,
            amount_sent: amount,
            amount_received,
            from_currency: sender_wallet.currency,
            to_currency: recipient_wallet.currency,
            recipient_name: recipient.name,
        })
    }

    /// Preview a transfer recipient. Never fails for a missing recipient.
    pub async fn lookup_recipient(
        &self,
        email: &str,
        sender_currency: &str,
    ) -> Result<RecipientLookup, AppError> {
        let Some(recipient) = self.repo.get_user_by_email(email).await? else {
            return Ok(RecipientLookup::NotFound {
                reason: "User not found with this email".to_string(),
            });
        };
        let Some(wallet) = self.repo.default_wallet_for_user(recipient.id).await? else {
            return Ok(RecipientLookup::NotFound {
                reason: "Recipient has no wallet".to_string(),
            });
        };

        let exchange_rate = self
            .rates
            .exchange_rate(sender_currency, &wallet.currency)
            .await
            .ok_or_else(|| AppError::RateUnavailable {
                from: normalize_code(sender_currency),
                to: wallet.currency.clone(),
            })?;

        Ok(RecipientLookup::Found {
            name: recipient.name,
            wallet_id: wallet.id,
            currency: wallet.currency,
            symbol: wallet.symbol,
            exchange_rate,
        })
    }

    /// Move `amount` (in the source wallet's currency) between two wallets
    /// of the same user.
    pub async fn convert(
        &self,
        from_wallet_id: WalletId,
        to_wallet_id: WalletId,
        amount: Cents,
    ) -> Result<ConversionReceipt, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let from = self.get_wallet(from_wallet_id).await?;
        let to = self.get_wallet(to_wallet_id).await?;

        if from.user_id != to.user_id {
            return Err(AppError::CrossUserConversion);
        }
        if from.id == to.id {
            return Err(AppError::SameWallet(from.id));
        }
        Self::ensure_funds(&from, amount)?;

        let rates = self.rates.rates().await;
        let credited = Self::price(&rates, amount, &from.currency, &to.currency)?;
        let rate = exchange_rate_with(&rates, &from.currency, &to.currency).ok_or_else(|| {
            AppError::RateUnavailable {
                from: from.currency.clone(),
                to: to.currency.clone(),
            }
        })?;

        let guards = self.locks.lock(&[from.id, to.id]).await;
        let from = self.get_wallet(from.id).await?;
        Self::ensure_funds(&from, amount)?;

        let mut movement = Movement::conversion(&from, &to, amount, credited, Utc::now());
        let balances = self.commit(&mut movement).await?;
        drop(guards);

        let transaction_id = movement
            .primary_transaction_id()
            .ok_or_else(|| anyhow::anyhow!("conversion produced no records"))?;

        info!(
            transaction_id = %transaction_id,
            from_wallet = %from.id,
            to_wallet = %to.id,
            debited = amount,
            credited,
            "conversion committed"
        );

        self.notifier.notify(LedgerEvent::ConversionCompleted {
            user_id: from.user_id,
            from_amount_cents: amount,
            from_currency: from.currency.clone(),
            to_amount_cents: credited,
            to_currency: to.currency.clone(),
        });

        Ok(ConversionReceipt {
            transaction_id,
            debited: amount,
            credited,
            from_balance: balance_of(&balances, from.id)?,
            to_balance: balance_of(&balances, to.id)?,
            from_currency: from.currency,
            to_currency: to.currency,
            rate,
        })
    }

    /// Credit an external deposit to one wallet.
    pub async fn credit_deposit(
        &self,
        wallet_id: WalletId,
        amount: Cents,
        description: &str,
        payment_ref: Option<String>,
    ) -> Result<DepositReceipt, AppError> {
        if amount <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let wallet = self.get_wallet(wallet_id).await?;

        let guards = self.locks.lock(&[wallet.id]).await;
        let mut movement = Movement::deposit(&wallet, amount, description, payment_ref, Utc::now());
        let balances = self.commit(&mut movement).await?;
        drop(guards);

        let transaction_id = movement
            .primary_transaction_id()
            .ok_or_else(|| anyhow::anyhow!("deposit produced no records"))?;
        let new_balance = balance_of(&balances, wallet.id)?;

        info!(
            transaction_id = %transaction_id,
            wallet_id = %wallet.id,
            amount,
            "deposit credited"
        );

        self.notifier.notify(LedgerEvent::DepositCredited {
            user_id: wallet.user_id,
            amount_cents: amount,
            currency: wallet.currency.clone(),
        });

        Ok(DepositReceipt {
            transaction_id,
            wallet_id: wallet.id,
            amount,
            currency: wallet.currency,
            new_balance,
        })
    }

    /// Credit a confirmed card payment. Each payment reference is credited
    /// at most once.
    pub async fn confirm_payment(
        &self,
        wallet_id: WalletId,
        payment: &PaymentConfirmation,
    ) -> Result<DepositReceipt, AppError> {
        if !payment.status.eq_ignore_ascii_case(PAYMENT_SUCCEEDED) {
            return Err(AppError::PaymentNotSucceeded(payment.status.clone()));
        }
        let reference = payment.payment_reference.trim();
        if self
            .repo
            .find_transaction_by_payment_ref(reference)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicatePayment(reference.to_string()));
        }

        let result = self
            .credit_deposit(
                wallet_id,
                payment.amount,
                "Card Deposit",
                Some(reference.to_string()),
            )
            .await;

        // A concurrent confirmation of the same reference trips the unique
        // index instead of the check above.
        if let Err(AppError::Database(err)) = &result {
            if self
                .repo
                .find_transaction_by_payment_ref(reference)
                .await?
                .is_some()
            {
                warn!(payment_ref = reference, error = %err, "payment credited concurrently");
                return Err(AppError::DuplicatePayment(reference.to_string()));
            }
        }
        result
    }

    // ========================
    // Queries and reports
    // ========================

    /// Transactions of one wallet, newest first.
    pub async fn wallet_transactions(
        &self,
        wallet_id: WalletId,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>, AppError> {
        let wallet = self.get_wallet(wallet_id).await?;
        Ok(self
            .repo
            .list_transactions_for_wallet(wallet.id, limit)
            .await?)
    }

    /// Transactions across all of a user's wallets, newest first.
    pub async fn user_transactions(
        &self,
        user_id: UserId,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>, AppError> {
        let user = self.get_user(user_id).await?;
        Ok(self
            .repo
            .list_transactions_for_user(user.id, limit)
            .await?)
    }

    pub async fn wallet_stats(&self, wallet_id: WalletId) -> Result<WalletStats, AppError> {
        let wallet = self.get_wallet(wallet_id).await?;
        let transactions = self
            .repo
            .list_transactions_for_wallet(wallet.id, None)
            .await?;
        Ok(reporting::wallet_stats(&wallet, &transactions))
    }

    pub async fn user_summary(&self, user_id: UserId) -> Result<UserSummary, AppError> {
        let user = self.get_user(user_id).await?;
        let mut wallets = Vec::new();
        for wallet in self.repo.list_wallets_for_user(user.id).await? {
            let transactions = self
                .repo
                .list_transactions_for_wallet(wallet.id, None)
                .await?;
            wallets.push((wallet, transactions));
        }

        let rates = self.rates.rates().await;
        Ok(reporting::user_summary(user.id, &wallets, &rates))
    }

    pub async fn monthly_report(
        &self,
        user_id: UserId,
        year: i32,
        month: u32,
    ) -> Result<MonthlyReport, AppError> {
        let user = self.get_user(user_id).await?;
        let currencies: HashMap<WalletId, String> = self
            .repo
            .list_wallets_for_user(user.id)
            .await?
            .into_iter()
            .map(|w| (w.id, w.currency))
            .collect();
        let transactions = self.repo.list_transactions_for_user(user.id, None).await?;

        let rates = self.rates.rates().await;
        reporting::monthly_report(year, month, &transactions, &currencies, &rates)
            .ok_or_else(|| AppError::not_found("Month", format!("{}-{}", year, month)))
    }

    /// Current exchange rate table.
    pub async fn rates(&self) -> Arc<RateTable> {
        self.rates.rates().await
    }

    // ========================
    // Notifications
    // ========================

    pub async fn notifications(
        &self,
        user_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, AppError> {
        let user = self.get_user(user_id).await?;
        Ok(self.repo.list_notifications(user.id, unread_only).await?)
    }

    pub async fn unread_count(&self, user_id: UserId) -> Result<i64, AppError> {
        Ok(self.repo.count_unread_notifications(user_id).await?)
    }

    pub async fn mark_notification_read(&self, id: NotificationId) -> Result<(), AppError> {
        if self.repo.mark_notification_read(id).await? {
            Ok(())
        } else {
            Err(AppError::not_found("Notification", id))
        }
    }

    pub async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<u64, AppError> {
        let user = self.get_user(user_id).await?;
        Ok(self.repo.mark_all_notifications_read(user.id).await?)
    }

    // ========================
    // Helpers
    // ========================

    fn ensure_funds(wallet: &Wallet, amount: Cents) -> Result<(), AppError> {
        if wallet.has_funds(amount) {
            Ok(())
        } else {
            Err(AppError::InsufficientBalance {
                wallet_id: wallet.id,
                balance: wallet.balance_cents,
                required: amount,
            })
        }
    }

    /// Converted amount for the receiving leg. Zero is rejected: a movement
    /// must credit something.
    fn price(rates: &RateTable, amount: Cents, from: &str, to: &str) -> Result<Cents, AppError> {
        let converted =
            convert_with(rates, amount, from, to).ok_or_else(|| AppError::RateUnavailable {
                from: from.to_string(),
                to: to.to_string(),
            })?;
        if converted <= 0 {
            return Err(AppError::InvalidAmount(format!(
                "Amount is too small to convert from {} to {}",
                from, to
            )));
        }
        Ok(converted)
    }

    async fn commit(&self, movement: &mut Movement) -> Result<Vec<(WalletId, Cents)>, AppError> {
        match self.repo.apply_movement(movement).await? {
            CommitOutcome::Committed(balances) => Ok(balances),
            CommitOutcome::Rejected { wallet_id } => {
                let wallet = self.get_wallet(wallet_id).await?;
                let required = movement
                    .changes
                    .iter()
                    .find(|c| c.wallet_id == wallet_id)
                    .map(|c| -c.delta_cents)
                    .unwrap_or_default();
                warn!(
                    wallet_id = %wallet_id,
                    balance = wallet.balance_cents,
                    required,
                    "movement rejected by balance guard"
                );
                Err(AppError::InsufficientBalance {
                    wallet_id,
                    balance: wallet.balance_cents,
                    required,
                })
            }
            CommitOutcome::Overflow { wallet_id } => {
                warn!(wallet_id = %wallet_id, "credit would overflow wallet balance");
                Err(AppError::InvalidAmount(format!(
                    "Amount would exceed the maximum balance of wallet {}",
                    wallet_id
                )))
            }
        }
    }
}

fn balance_of(balances: &[(WalletId, Cents)], wallet_id: WalletId) -> Result<Cents, AppError> {
    balances
        .iter()
        .find(|(id, _)| *id == wallet_id)
        .map(|(_, balance)| *balance)
        .ok_or_else(|| anyhow::anyhow!("no committed balance for wallet {}", wallet_id).into())
}
