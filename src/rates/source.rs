use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::RateTable;
use crate::domain::currency::normalize_code;

/// Somewhere a fresh rate table can be fetched from.
///
/// Every failure (network, status, payload) is just an `Err`; the provider
/// treats them all the same way.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<RateTable>;
}

/// Fetches rates with a single HTTP GET returning `{"rates": {"EUR": "0.92", ...}}`.
pub struct HttpRateSource {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpRateSource {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for rate source")?;

        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self) -> Result<RateTable> {
        let mut request = self.client.get(&self.url);
        if let Some(key) = &self.api_key {
            request = request.query(&[("apikey", key)]);
        }

        let response = request
            .send()
            .await
            .context("Rate source request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Rate source returned HTTP {}", status);
        }

        let body = response
            .text()
            .await
            .context("Failed to read rate source response")?;

        let rates = parse_rates_document(&body)?;
        debug!(source = self.name(), count = rates.len(), "fetched exchange rates");
        Ok(rates)
    }
}

/// A source that is never reachable. The provider then serves its
/// fallback table, which makes runs deterministic.
pub struct OfflineRateSource;

#[async_trait]
impl RateSource for OfflineRateSource {
    fn name(&self) -> &str {
        "offline"
    }

    async fn fetch(&self) -> Result<RateTable> {
        bail!("Rate source disabled (offline mode)")
    }
}

#[derive(Deserialize)]
struct RatesDocument {
    rates: HashMap<String, Value>,
}

/// Parse a rates document. Rates may be JSON numbers or numeric strings;
/// entries that are not positive numbers are skipped. A document without a
/// single usable rate is an error.
pub fn parse_rates_document(body: &str) -> Result<RateTable> {
    let document: RatesDocument =
        serde_json::from_str(body).context("Malformed rates document")?;

    let rates: RateTable = document
        .rates
        .into_iter()
        .filter_map(|(code, value)| {
            let rate = match value {
                Value::Number(n) => parse_decimal(&n.to_string()),
                Value::String(s) => parse_decimal(&s),
                _ => None,
            }?;
            (rate > Decimal::ZERO).then(|| (normalize_code(&code), rate))
        })
        .collect();

    if rates.is_empty() {
        bail!("Rates document contained no usable rates");
    }
    Ok(rates)
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}
