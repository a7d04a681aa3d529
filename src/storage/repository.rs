use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Cents, Movement, Notification, NotificationId, Transaction, TransactionId, TransactionStatus,
    TransactionType, User, UserId, Wallet, WalletId, normalize_email,
};

use super::{MIGRATION_001_INITIAL, MIGRATION_002_NOTIFICATIONS};

const WALLET_COLUMNS: &str =
    "id, user_id, currency, symbol, name, flag, balance_cents, daily_change, sequence, created_at";
const TRANSACTION_COLUMNS: &str =
    "id, sequence, wallet_id, kind, amount_cents, description, status, created_at, payment_ref";

/// Result of applying a [`Movement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// All changes and records are durable. New balances, in change order.
    Committed(Vec<(WalletId, Cents)>),
    /// A wallet was missing or would have gone negative; nothing was written.
    Rejected { wallet_id: WalletId },
    /// A credit would carry the balance past [`Cents::MAX`]; nothing was written.
    Overflow { wallet_id: WalletId },
}

/// Repository for persisting and querying users, wallets, transactions and
/// notifications.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL (e.g. `sqlite:valuta.db?mode=rwc`).
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run repeatedly.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        sqlx::query(MIGRATION_002_NOTIFICATIONS)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 002")?;

        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // User operations
    // ========================

    /// Save a user together with their starter wallets in one transaction.
    /// Wallet sequence numbers are assigned in slice order.
    pub async fn save_user_with_wallets(&self, user: &User, wallets: &mut [Wallet]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, phone, country, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.country)
        .bind(user.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save user")?;

        for wallet in wallets.iter_mut() {
            Self::insert_wallet(&mut tx, wallet).await?;
        }

        tx.commit().await.context("Failed to commit user")?;
        Ok(())
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, name, email, phone, country, created_at FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    /// Get a user by email (case-insensitive).
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, name, email, phone, country, created_at FROM users WHERE email = ?",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by email")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    /// List all users in registration order.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, name, email, phone, country, created_at FROM users ORDER BY created_at, email",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        rows.iter().map(Self::row_to_user).collect()
    }

    fn row_to_user(row: &SqliteRow) -> Result<User> {
        let id_str: String = row.get("id");
        Ok(User {
            id: Uuid::parse_str(&id_str).context("Invalid user ID")?,
            name: row.get("name"),
            email: row.get("email"),
            phone: row.get("phone"),
            country: row.get("country"),
            created_at: parse_timestamp(row.get("created_at"))?,
        })
    }

    // ========================
    // Wallet operations
    // ========================

    /// Save a new wallet. Assigns the next creation sequence number.
    pub async fn save_wallet(&self, wallet: &mut Wallet) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        Self::insert_wallet(&mut tx, wallet).await?;
        tx.commit().await.context("Failed to commit wallet")?;
        Ok(())
    }

    async fn insert_wallet(conn: &mut SqliteConnection, wallet: &mut Wallet) -> Result<()> {
        wallet.sequence = Self::next_sequence(conn, "wallet_sequence").await?;

        sqlx::query(
            r#"
            INSERT INTO wallets (id, user_id, currency, symbol, name, flag, balance_cents, daily_change, sequence, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(wallet.id.to_string())
        .bind(wallet.user_id.to_string())
        .bind(&wallet.currency)
        .bind(&wallet.symbol)
        .bind(&wallet.name)
        .bind(&wallet.flag)
        .bind(wallet.balance_cents)
        .bind(wallet.daily_change)
        .bind(wallet.sequence)
        .bind(wallet.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to save wallet")?;
        Ok(())
    }

    /// Get a wallet by ID.
    pub async fn get_wallet(&self, id: WalletId) -> Result<Option<Wallet>> {
        let row = sqlx::query(&format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch wallet")?;

        row.as_ref().map(Self::row_to_wallet).transpose()
    }

    /// List a user's wallets in creation order.
    pub async fn list_wallets_for_user(&self, user_id: UserId) -> Result<Vec<Wallet>> {
        let rows = sqlx::query(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = ? ORDER BY sequence"
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list wallets")?;

        rows.iter().map(Self::row_to_wallet).collect()
    }

    /// The first wallet ever created for a user.
    pub async fn default_wallet_for_user(&self, user_id: UserId) -> Result<Option<Wallet>> {
        let row = sqlx::query(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = ? ORDER BY sequence LIMIT 1"
        ))
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch default wallet")?;

        row.as_ref().map(Self::row_to_wallet).transpose()
    }

    /// Find a user's wallet in a given currency.
    pub async fn get_wallet_for_currency(
        &self,
        user_id: UserId,
        currency: &str,
    ) -> Result<Option<Wallet>> {
        let row = sqlx::query(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = ? AND currency = ?"
        ))
        .bind(user_id.to_string())
        .bind(currency)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch wallet by currency")?;

        row.as_ref().map(Self::row_to_wallet).transpose()
    }

    fn row_to_wallet(row: &SqliteRow) -> Result<Wallet> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");

        Ok(Wallet {
            id: Uuid::parse_str(&id_str).context("Invalid wallet ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid wallet owner ID")?,
            currency: row.get("currency"),
            symbol: row.get("symbol"),
            name: row.get("name"),
            flag: row.get("flag"),
            balance_cents: row.get("balance_cents"),
            daily_change: row.get("daily_change"),
            sequence: row.get("sequence"),
            created_at: parse_timestamp(row.get("created_at"))?,
        })
    }

    // ========================
    // Ledger operations
    // ========================

    /// Apply all balance changes of a movement and write its transaction
    /// records as one atomic unit.
    ///
    /// Each change is a guarded `UPDATE` that only matches when the resulting
    /// balance stays within `0..=Cents::MAX`. If any change fails to match,
    /// the SQL transaction is dropped (rolled back) and nothing is written.
    pub async fn apply_movement(&self, movement: &mut Movement) -> Result<CommitOutcome> {
        debug_assert!(movement.is_paired(), "movement without a record per wallet");

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut balances = Vec::with_capacity(movement.changes.len());

        for change in &movement.changes {
            let row = sqlx::query(
                r#"
                UPDATE wallets
                SET balance_cents = balance_cents + ?
                WHERE id = ?
                  AND (? <= 0 OR balance_cents <= ? - ?)
                  AND balance_cents + ? >= 0
                RETURNING balance_cents
                "#,
            )
            .bind(change.delta_cents)
            .bind(change.wallet_id.to_string())
            .bind(change.delta_cents)
            .bind(Cents::MAX)
            .bind(change.delta_cents)
            .bind(change.delta_cents)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to update wallet balance")?;

            let Some(row) = row else {
                let wallet_id = change.wallet_id;
                return Ok(if change.delta_cents > 0 {
                    CommitOutcome::Overflow { wallet_id }
                } else {
                    CommitOutcome::Rejected { wallet_id }
                });
            };
            let balance: Cents = row
                .try_get("balance_cents")
                .context("Wallet balance is not an integer")?;
            balances.push((change.wallet_id, balance));
        }

        for record in movement.transactions.iter_mut() {
            Self::insert_transaction(&mut tx, record).await?;
        }

        tx.commit().await.context("Failed to commit movement")?;
        Ok(CommitOutcome::Committed(balances))
    }

    /// Record a transaction without touching any balance.
    pub async fn save_transaction(&self, transaction: &mut Transaction) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        Self::insert_transaction(&mut tx, transaction).await?;
        tx.commit().await.context("Failed to commit transaction record")?;
        Ok(())
    }

    async fn insert_transaction(
        conn: &mut SqliteConnection,
        record: &mut Transaction,
    ) -> Result<()> {
        record.sequence = Self::next_sequence(conn, "transaction_sequence").await?;

        sqlx::query(
            r#"
            INSERT INTO transactions (id, sequence, wallet_id, kind, amount_cents, description, status, created_at, payment_ref)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.sequence)
        .bind(record.wallet_id.to_string())
        .bind(record.kind.as_str())
        .bind(record.amount_cents)
        .bind(&record.description)
        .bind(record.status.as_str())
        .bind(record.created_at.to_rfc3339())
        .bind(&record.payment_ref)
        .execute(&mut *conn)
        .await
        .context("Failed to save transaction")?;
        Ok(())
    }

    /// Get the next value of a named counter and increment it.
    async fn next_sequence(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = ?
            RETURNING value
            "#,
        )
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("Failed to get next {} number", name))?;

        Ok(row.get("value"))
    }

    /// Get a transaction by ID.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    /// Find the deposit recorded for an external payment.
    pub async fn find_transaction_by_payment_ref(
        &self,
        payment_ref: &str,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE payment_ref = ?"
        ))
        .bind(payment_ref)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction by payment reference")?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    /// List a wallet's transactions, newest first.
    pub async fn list_transactions_for_wallet(
        &self,
        wallet_id: WalletId,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>> {
        let mut query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE wallet_id = ? ORDER BY sequence DESC"
        );
        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let rows = sqlx::query(&query)
            .bind(wallet_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions for wallet")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// List transactions across all of a user's wallets, newest first.
    pub async fn list_transactions_for_user(
        &self,
        user_id: UserId,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>> {
        let mut query = String::from(
            r#"
            SELECT t.id, t.sequence, t.wallet_id, t.kind, t.amount_cents, t.description, t.status, t.created_at, t.payment_ref
            FROM transactions t
            JOIN wallets w ON w.id = t.wallet_id
            WHERE w.user_id = ?
            ORDER BY t.sequence DESC
            "#,
        );
        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let rows = sqlx::query(&query)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions for user")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Count all transaction records.
    pub async fn count_transactions(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM transactions")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions")?;
        Ok(row.get("count"))
    }

    fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
        let id_str: String = row.get("id");
        let wallet_id_str: String = row.get("wallet_id");
        let kind_str: String = row.get("kind");
        let status_str: String = row.get("status");

        Ok(Transaction {
            id: Uuid::parse_str(&id_str).context("Invalid transaction ID")?,
            sequence: row.get("sequence"),
            wallet_id: Uuid::parse_str(&wallet_id_str).context("Invalid wallet ID")?,
            kind: TransactionType::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction type: {}", kind_str))?,
            amount_cents: row.get("amount_cents"),
            description: row.get("description"),
            status: TransactionStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction status: {}", status_str))?,
            created_at: parse_timestamp(row.get("created_at"))?,
            payment_ref: row.get("payment_ref"),
        })
    }

    // ========================
    // Notification operations
    // ========================

    pub async fn save_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, message, amount_cents, currency, is_read, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(notification.id.to_string())
        .bind(notification.user_id.to_string())
        .bind(&notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.amount_cents)
        .bind(&notification.currency)
        .bind(notification.is_read)
        .bind(notification.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save notification")?;
        Ok(())
    }

    /// List a user's notifications, newest first.
    pub async fn list_notifications(
        &self,
        user_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        let query = if unread_only {
            "SELECT id, user_id, kind, title, message, amount_cents, currency, is_read, created_at FROM notifications WHERE user_id = ? AND is_read = 0 ORDER BY created_at DESC, rowid DESC"
        } else {
            "SELECT id, user_id, kind, title, message, amount_cents, currency, is_read, created_at FROM notifications WHERE user_id = ? ORDER BY created_at DESC, rowid DESC"
        };

        let rows = sqlx::query(query)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list notifications")?;

        rows.iter().map(Self::row_to_notification).collect()
    }

    pub async fn count_unread_notifications(&self, user_id: UserId) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM notifications WHERE user_id = ? AND is_read = 0",
        )
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to count unread notifications")?;
        Ok(row.get("count"))
    }

    /// Mark one notification as read. Returns false if it does not exist.
    pub async fn mark_notification_read(&self, id: NotificationId) -> Result<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to mark notification as read")?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark all of a user's notifications as read. Returns how many changed.
    pub async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<u64> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
                .bind(user_id.to_string())
                .execute(&self.pool)
                .await
                .context("Failed to mark notifications as read")?;
        Ok(result.rows_affected())
    }

    fn row_to_notification(row: &SqliteRow) -> Result<Notification> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");

        Ok(Notification {
            id: Uuid::parse_str(&id_str).context("Invalid notification ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid user ID")?,
            kind: row.get("kind"),
            title: row.get("title"),
            message: row.get("message"),
            amount_cents: row.get("amount_cents"),
            currency: row.get("currency"),
            is_read: row.get::<i32, _>("is_read") != 0,
            created_at: parse_timestamp(row.get("created_at"))?,
        })
    }
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(&value)
        .with_context(|| format!("Invalid timestamp: {}", value))?
        .with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::domain::currency;

    async fn test_repo() -> Result<(Repository, TempDir)> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("repo.db");
        let repo = Repository::init(&format!("sqlite:{}?mode=rwc", db_path.display())).await?;
        Ok((repo, temp_dir))
    }

    async fn user_with_wallets(
        repo: &Repository,
        email: &str,
        codes: &[&str],
    ) -> Result<(User, Vec<Wallet>)> {
        let user = User::new("Test", email);
        let mut wallets: Vec<Wallet> = codes
            .iter()
            .map(|c| Wallet::new(user.id, currency::lookup(c).unwrap()))
            .collect();
        repo.save_user_with_wallets(&user, &mut wallets).await?;
        Ok((user, wallets))
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        repo.migrate().await?;
        assert_eq!(repo.count_transactions().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_wallets_keep_creation_order() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        let (user, wallets) =
            user_with_wallets(&repo, "a@example.com", &["JPY", "USD", "EUR"]).await?;

        let listed = repo.list_wallets_for_user(user.id).await?;
        let codes: Vec<_> = listed.iter().map(|w| w.currency.as_str()).collect();
        assert_eq!(codes, vec!["JPY", "USD", "EUR"]);

        let default = repo.default_wallet_for_user(user.id).await?.unwrap();
        assert_eq!(default.id, wallets[0].id);
        assert!(wallets[0].sequence < wallets[1].sequence);
        Ok(())
    }

    #[tokio::test]
    async fn test_one_wallet_per_currency_is_enforced() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        let (user, _) = user_with_wallets(&repo, "a@example.com", &["USD"]).await?;

        let mut duplicate = Wallet::new(user.id, currency::lookup("USD").unwrap());
        assert!(repo.save_wallet(&mut duplicate).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_movement_writes_nothing() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        let (_, wallets) = user_with_wallets(&repo, "a@example.com", &["USD", "EUR"]).await?;

        let mut movement =
            Movement::conversion(&wallets[0], &wallets[1], 100, 92, Utc::now());
        let outcome = repo.apply_movement(&mut movement).await?;

        assert_eq!(
            outcome,
            CommitOutcome::Rejected {
                wallet_id: wallets[0].id
            }
        );
        assert_eq!(repo.count_transactions().await?, 0);
        let to = repo.get_wallet(wallets[1].id).await?.unwrap();
        assert_eq!(to.balance_cents, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_credit_past_max_balance_is_rejected() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        let (_, wallets) = user_with_wallets(&repo, "a@example.com", &["USD"]).await?;

        let mut seed = Movement::deposit(&wallets[0], Cents::MAX - 1, "seed", None, Utc::now());
        repo.apply_movement(&mut seed).await?;

        let mut top_up = Movement::deposit(&wallets[0], 10, "top up", None, Utc::now());
        let outcome = repo.apply_movement(&mut top_up).await?;

        assert_eq!(
            outcome,
            CommitOutcome::Overflow {
                wallet_id: wallets[0].id
            }
        );
        let stored = repo.get_wallet(wallets[0].id).await?.unwrap();
        assert_eq!(stored.balance_cents, Cents::MAX - 1);
        assert_eq!(repo.count_transactions().await?, 1);

        let mut exact = Movement::deposit(&wallets[0], 1, "last cent", None, Utc::now());
        let outcome = repo.apply_movement(&mut exact).await?;
        assert_eq!(
            outcome,
            CommitOutcome::Committed(vec![(wallets[0].id, Cents::MAX)])
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_committed_movement_updates_balances_and_records() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        let (user, wallets) = user_with_wallets(&repo, "a@example.com", &["USD", "EUR"]).await?;

        let mut deposit = Movement::deposit(&wallets[0], 10000, "seed", None, Utc::now());
        repo.apply_movement(&mut deposit).await?;

        let mut movement =
            Movement::conversion(&wallets[0], &wallets[1], 5000, 4600, Utc::now());
        let outcome = repo.apply_movement(&mut movement).await?;

        assert_eq!(
            outcome,
            CommitOutcome::Committed(vec![(wallets[0].id, 5000), (wallets[1].id, 4600)])
        );
        assert!(movement.transactions.iter().all(|t| t.sequence > 0));

        let history = repo.list_transactions_for_user(user.id, None).await?;
        assert_eq!(history.len(), 3);
        // Newest first
        assert_eq!(history[0].id, movement.transactions[1].id);
        assert_eq!(history[2].description, "seed");

        let stored = repo.get_transaction(movement.transactions[0].id).await?.unwrap();
        assert_eq!(stored, movement.transactions[0]);
        Ok(())
    }

    #[tokio::test]
    async fn test_save_transaction_does_not_touch_balance() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        let (_, wallets) = user_with_wallets(&repo, "a@example.com", &["USD"]).await?;

        let mut pending = Transaction::new(
            wallets[0].id,
            TransactionType::Deposit,
            1500,
            "Card Deposit",
            Utc::now(),
        )
        .with_status(TransactionStatus::Pending)
        .with_payment_ref("pi_pending");
        repo.save_transaction(&mut pending).await?;

        let found = repo.find_transaction_by_payment_ref("pi_pending").await?.unwrap();
        assert_eq!(found.status, TransactionStatus::Pending);
        assert_eq!(repo.get_wallet(wallets[0].id).await?.unwrap().balance_cents, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_user_lookup_by_email_is_case_insensitive() -> Result<()> {
        let (repo, _temp) = test_repo().await?;
        let (user, _) = user_with_wallets(&repo, "Bob@Example.com", &["USD"]).await?;

        let found = repo.get_user_by_email("  BOB@example.COM").await?.unwrap();
        assert_eq!(found.id, user.id);
        assert!(repo.get_user_by_email("nobody@example.com").await?.is_none());
        Ok(())
    }
}
