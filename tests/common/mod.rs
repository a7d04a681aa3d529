// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tempfile::TempDir;
use valuta::application::{LedgerService, Registration};
use valuta::domain::{Cents, Wallet, WalletId};
use valuta::rates::{ExchangeRateProvider, RateSource, RateTable};

/// Helper to create a test service with a temporary database, serving the
/// built-in fallback rates.
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    service_with_provider(ExchangeRateProvider::offline()).await
}

/// Helper to create a test service whose rates come from a fixed table.
pub async fn test_service_with_rates(
    rates: &[(&str, Decimal)],
) -> Result<(LedgerService, TempDir)> {
    let source = Arc::new(FixedRateSource::new(rates));
    service_with_provider(ExchangeRateProvider::new(source)).await
}

pub async fn service_with_provider(
    provider: ExchangeRateProvider,
) -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap(), Arc::new(provider)).await?;
    Ok((service, temp_dir))
}

/// Rate source that always answers with the same table.
pub struct FixedRateSource {
    rates: RateTable,
}

impl FixedRateSource {
    pub fn new(rates: &[(&str, Decimal)]) -> Self {
        Self {
            rates: rates.iter().map(|(c, r)| (c.to_string(), *r)).collect(),
        }
    }
}

#[async_trait]
impl RateSource for FixedRateSource {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn fetch(&self) -> Result<RateTable> {
        Ok(self.rates.clone())
    }
}

/// Test fixture: registered users with starter wallets
pub struct Users;

impl Users {
    pub async fn register(
        service: &LedgerService,
        name: &str,
        email: &str,
    ) -> Result<Registration> {
        Ok(service.register_user(name, email, None, None).await?)
    }

    /// Register a user and fund their USD wallet.
    pub async fn funded(
        service: &LedgerService,
        name: &str,
        email: &str,
        usd_cents: Cents,
    ) -> Result<Registration> {
        let registration = Self::register(service, name, email).await?;
        if usd_cents > 0 {
            service
                .credit_deposit(registration.wallets[0].id, usd_cents, "Seed", None)
                .await?;
        }
        Ok(registration)
    }
}

pub async fn balance(service: &LedgerService, wallet_id: WalletId) -> Result<Cents> {
    Ok(service.get_wallet(wallet_id).await?.balance_cents)
}

/// Sum of all balances, grouped by currency.
pub async fn totals_by_currency(
    service: &LedgerService,
    wallets: &[&Wallet],
) -> Result<std::collections::BTreeMap<String, Cents>> {
    let mut totals = std::collections::BTreeMap::new();
    for wallet in wallets {
        *totals.entry(wallet.currency.clone()).or_insert(0) +=
            balance(service, wallet.id).await?;
    }
    Ok(totals)
}
