//! Runtime configuration.
//!
//! Every setting can come from a command-line flag or from its `VALUTA_*`
//! environment variable; flags win.

use std::time::Duration;

use clap::Args;

/// Public endpoint returning the latest rates against USD.
pub const DEFAULT_RATES_URL: &str = "https://api.currencyfreaks.com/v2.0/rates/latest";

/// Exchange rate settings as passed on the command line.
#[derive(Args, Debug, Clone)]
pub struct RatesArgs {
    /// Exchange rate endpoint
    #[arg(long, env = "VALUTA_RATES_URL", default_value = DEFAULT_RATES_URL)]
    pub rates_url: String,

    /// API key sent as the `apikey` query parameter
    #[arg(long, env = "VALUTA_RATES_API_KEY", hide_env_values = true)]
    pub rates_api_key: Option<String>,

    /// Seconds a fetched rate table stays fresh
    #[arg(long, env = "VALUTA_RATES_TTL_SECS", default_value_t = 600)]
    pub rates_ttl_secs: u64,

    /// Seconds before a rate fetch is abandoned
    #[arg(long, env = "VALUTA_RATES_TIMEOUT_SECS", default_value_t = 5)]
    pub rates_timeout_secs: u64,

    /// Never contact the rate endpoint; use built-in fallback rates
    #[arg(long, env = "VALUTA_OFFLINE")]
    pub offline: bool,
}

/// Exchange rate configuration consumed by the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatesConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub cache_ttl: Duration,
    pub timeout: Duration,
    pub offline: bool,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RATES_URL.to_string(),
            api_key: None,
            cache_ttl: Duration::from_secs(600),
            timeout: Duration::from_secs(5),
            offline: false,
        }
    }
}

impl From<&RatesArgs> for RatesConfig {
    fn from(args: &RatesArgs) -> Self {
        Self {
            url: args.rates_url.clone(),
            api_key: args.rates_api_key.clone().filter(|k| !k.is_empty()),
            cache_ttl: Duration::from_secs(args.rates_ttl_secs),
            // A zero timeout would fail every fetch immediately.
            timeout: Duration::from_secs(args.rates_timeout_secs.max(1)),
            offline: args.offline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_config() {
        let args = RatesArgs {
            rates_url: "http://localhost:9999/rates".into(),
            rates_api_key: Some(String::new()),
            rates_ttl_secs: 30,
            rates_timeout_secs: 0,
            offline: true,
        };

        let config = RatesConfig::from(&args);
        assert_eq!(config.url, "http://localhost:9999/rates");
        assert_eq!(config.api_key, None);
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert!(config.offline);
    }

    #[test]
    fn test_default_matches_documented_values() {
        let config = RatesConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(600));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.offline);
    }
}
