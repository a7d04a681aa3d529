use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::LedgerService;
use crate::domain::{Transaction, User, UserId, Wallet, format_cents};

/// Database snapshot for full export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub users: Vec<User>,
    pub wallets: Vec<Wallet>,
    pub transactions: Vec<Transaction>,
}

/// Optional inclusive date window for transaction exports.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export a user's transactions (newest first) to CSV format
    pub async fn export_transactions_csv<W: Write>(
        &self,
        user_id: UserId,
        range: DateRange,
        writer: W,
    ) -> Result<usize> {
        let wallets = self.service.list_wallets(user_id).await?;
        let transactions = self.service.user_transactions(user_id, None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "date",
            "type",
            "amount",
            "currency",
            "description",
            "status",
            "payment_ref",
        ])?;

        let mut count = 0;
        for tx in transactions.iter().filter(|t| range.contains(t.created_at)) {
            let currency = wallets
                .iter()
                .find(|w| w.id == tx.wallet_id)
                .map(|w| w.currency.as_str())
                .unwrap_or_default();

            csv_writer.write_record([
                tx.id.to_string(),
                tx.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                tx.kind.to_string(),
                format_cents(tx.amount_cents),
                currency.to_string(),
                tx.description.clone(),
                tx.status.to_string(),
                tx.payment_ref.clone().unwrap_or_default(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export a user's wallet balances to CSV format
    pub async fn export_wallets_csv<W: Write>(&self, user_id: UserId, writer: W) -> Result<usize> {
        let wallets = self.service.list_wallets(user_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "currency", "name", "balance"])?;

        for wallet in &wallets {
            csv_writer.write_record([
                wallet.id.to_string(),
                wallet.currency.clone(),
                wallet.name.clone(),
                format_cents(wallet.balance_cents),
            ])?;
        }

        csv_writer.flush()?;
        Ok(wallets.len())
    }

    /// Export full database as JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let users = self.service.list_users().await?;
        let mut wallets = Vec::new();
        let mut transactions = Vec::new();
        for user in &users {
            wallets.extend(self.service.list_wallets(user.id).await?);
            transactions.extend(self.service.user_transactions(user.id, None).await?);
        }
        transactions.sort_by_key(|t| t.sequence);

        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            users,
            wallets,
            transactions,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
