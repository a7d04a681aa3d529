use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{HttpRateSource, OfflineRateSource, RateSource, RateTable};
use crate::config::RatesConfig;
use crate::domain::currency::{self, normalize_code};
use crate::domain::{BASE_CURRENCY, Cents, cents_to_decimal, decimal_to_cents, round_to_minor};

/// How long a fetched snapshot is served without asking the source again.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
struct RateSnapshot {
    rates: Arc<RateTable>,
    fetched_at: Instant,
}

/// Serves exchange rates from a cached snapshot, refreshing it from a
/// [`RateSource`] when it expires.
///
/// Lookups never fail: a failed refresh falls back to the stale snapshot if
/// there is one, otherwise to the built-in table from
/// [`currency::CURRENCIES`]. The snapshot is replaced as a whole, so readers
/// never see a half-updated table.
pub struct ExchangeRateProvider {
    source: Arc<dyn RateSource>,
    ttl: Duration,
    cache: RwLock<Option<RateSnapshot>>,
    // Serializes refreshes so concurrent misses trigger a single fetch.
    refresh: Mutex<()>,
}

impl ExchangeRateProvider {
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self {
            source,
            ttl: DEFAULT_CACHE_TTL,
            cache: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Build a provider from runtime configuration.
    pub fn from_config(config: &RatesConfig) -> Result<Self> {
        let source: Arc<dyn RateSource> = if config.offline {
            Arc::new(OfflineRateSource)
        } else {
            Arc::new(HttpRateSource::new(
                config.url.clone(),
                config.api_key.clone(),
                config.timeout,
            )?)
        };
        Ok(Self::new(source).with_ttl(config.cache_ttl))
    }

    /// A provider that only ever serves the built-in fallback table.
    pub fn offline() -> Self {
        Self::new(Arc::new(OfflineRateSource))
    }

    /// Current rate table (fresh, stale, or fallback).
    pub async fn rates(&self) -> Arc<RateTable> {
        if let Some(rates) = self.fresh_rates().await {
            debug!("serving cached exchange rates");
            return rates;
        }

        let _refreshing = self.refresh.lock().await;
        // Another task may have refreshed while we waited.
        if let Some(rates) = self.fresh_rates().await {
            return rates;
        }

        match self.source.fetch().await {
            Ok(mut table) => {
                table.insert(BASE_CURRENCY.to_string(), Decimal::ONE);
                let rates = Arc::new(table);
                *self.cache.write().await = Some(RateSnapshot {
                    rates: Arc::clone(&rates),
                    fetched_at: Instant::now(),
                });
                info!(
                    source = self.source.name(),
                    count = rates.len(),
                    "exchange rates refreshed"
                );
                rates
            }
            Err(err) => {
                if let Some(snapshot) = self.cache.read().await.as_ref() {
                    warn!(
                        source = self.source.name(),
                        error = %err,
                        age_secs = snapshot.fetched_at.elapsed().as_secs(),
                        "rate refresh failed, serving stale rates"
                    );
                    return Arc::clone(&snapshot.rates);
                }
                warn!(
                    source = self.source.name(),
                    error = %err,
                    "rate refresh failed, serving fallback rates"
                );
                Arc::new(fallback_rates())
            }
        }
    }

    /// Convert `amount` between currencies, rounding the result once to cents.
    ///
    /// Same-currency conversions return the amount untouched. Returns `None`
    /// only if the arithmetic overflows.
    pub async fn convert(&self, amount: Cents, from: &str, to: &str) -> Option<Cents> {
        if from.trim().eq_ignore_ascii_case(to.trim()) {
            return Some(amount);
        }
        let rates = self.rates().await;
        convert_with(&rates, amount, from, to)
    }

    /// Price of one unit of `from` in `to`, at display precision.
    pub async fn exchange_rate(&self, from: &str, to: &str) -> Option<Decimal> {
        if from.trim().eq_ignore_ascii_case(to.trim()) {
            return Some(Decimal::ONE);
        }
        let rates = self.rates().await;
        exchange_rate_with(&rates, from, to)
    }

    async fn fresh_rates(&self) -> Option<Arc<RateTable>> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|s| !s.rates.is_empty() && s.fetched_at.elapsed() < self.ttl)
            .map(|s| Arc::clone(&s.rates))
    }
}

/// Convert with an explicit table: `amount / rate(from) * rate(to)`,
/// rounded half-up to cents.
pub fn convert_with(rates: &RateTable, amount: Cents, from: &str, to: &str) -> Option<Cents> {
    if from.trim().eq_ignore_ascii_case(to.trim()) {
        return Some(amount);
    }
    let (from_rate, to_rate) = rate_pair(rates, from, to);
    let converted = cents_to_decimal(amount)
        .checked_div(from_rate)?
        .checked_mul(to_rate)?;
    decimal_to_cents(converted)
}

/// Price of one unit of `from` in `to` from an explicit table, rounded to
/// display precision.
pub fn exchange_rate_with(rates: &RateTable, from: &str, to: &str) -> Option<Decimal> {
    if from.trim().eq_ignore_ascii_case(to.trim()) {
        return Some(Decimal::ONE);
    }
    let (from_rate, to_rate) = rate_pair(rates, from, to);
    Decimal::ONE
        .checked_div(from_rate)?
        .checked_mul(to_rate)
        .map(round_to_minor)
}

fn rate_pair(rates: &RateTable, from: &str, to: &str) -> (Decimal, Decimal) {
    (rate_or_par(rates, from), rate_or_par(rates, to))
}

fn rate_or_par(rates: &RateTable, code: &str) -> Decimal {
    let code = normalize_code(code);
    match rates.get(&code) {
        Some(rate) => *rate,
        None => {
            warn!(currency = %code, "no exchange rate known, assuming parity with base");
            Decimal::ONE
        }
    }
}

/// The built-in rate table used when no live or cached rates exist.
pub fn fallback_rates() -> RateTable {
    currency::CURRENCIES
        .iter()
        .filter_map(|c| {
            Decimal::from_str(c.fallback_rate)
                .ok()
                .map(|rate| (c.code.to_string(), rate))
        })
        .collect()
}
