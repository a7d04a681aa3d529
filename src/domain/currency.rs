use std::fmt;

/// Base currency every exchange rate is quoted against.
pub const BASE_CURRENCY: &str = "USD";

/// Display metadata and offline fallback rate for a supported currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyInfo {
    pub code: &'static str,
    pub symbol: &'static str,
    /// Name given to a wallet holding this currency.
    pub wallet_name: &'static str,
    pub flag: &'static str,
    /// Units of this currency per one USD, used when no live rate is known.
    pub fallback_rate: &'static str,
}

/// Supported currencies. Adding a currency is a new row here, nothing else.
pub const CURRENCIES: &[CurrencyInfo] = &[
    CurrencyInfo {
        code: "USD",
        symbol: "$",
        wallet_name: "US Dollar Wallet",
        flag: "🇺🇸",
        fallback_rate: "1.0",
    },
    CurrencyInfo {
        code: "EUR",
        symbol: "€",
        wallet_name: "Euro Wallet",
        flag: "🇪🇺",
        fallback_rate: "0.92",
    },
    CurrencyInfo {
        code: "GBP",
        symbol: "£",
        wallet_name: "British Pound Wallet",
        flag: "🇬🇧",
        fallback_rate: "0.79",
    },
    CurrencyInfo {
        code: "INR",
        symbol: "₹",
        wallet_name: "Indian Rupee Wallet",
        flag: "🇮🇳",
        fallback_rate: "83.0",
    },
    CurrencyInfo {
        code: "JPY",
        symbol: "¥",
        wallet_name: "Japanese Yen Wallet",
        flag: "🇯🇵",
        fallback_rate: "150.0",
    },
    CurrencyInfo {
        code: "AUD",
        symbol: "A$",
        wallet_name: "Australian Dollar Wallet",
        flag: "🇦🇺",
        fallback_rate: "1.53",
    },
    CurrencyInfo {
        code: "CAD",
        symbol: "C$",
        wallet_name: "Canadian Dollar Wallet",
        flag: "🇨🇦",
        fallback_rate: "1.36",
    },
    CurrencyInfo {
        code: "PKR",
        symbol: "₨",
        wallet_name: "Pakistani Rupee Wallet",
        flag: "🇵🇰",
        fallback_rate: "281.0",
    },
];

/// Currencies every new user starts with, in creation order.
/// The first entry becomes the user's default (receiving) wallet.
pub const STARTER_CURRENCIES: &[&str] = &["USD", "EUR"];

/// Normalize a currency code for comparison and storage.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Look up a supported currency by code (case-insensitive).
pub fn lookup(code: &str) -> Option<&'static CurrencyInfo> {
    let code = normalize_code(code);
    CURRENCIES.iter().find(|c| c.code == code)
}

impl fmt::Display for CurrencyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.flag, self.code, self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let eur = lookup("eur").unwrap();
        assert_eq!(eur.code, "EUR");
        assert_eq!(eur.symbol, "€");
        assert!(lookup(" usd ").is_some());
        assert!(lookup("XYZ").is_none());
    }

    #[test]
    fn test_codes_are_unique_and_uppercase() {
        for (i, a) in CURRENCIES.iter().enumerate() {
            assert_eq!(a.code, a.code.to_ascii_uppercase());
            for b in &CURRENCIES[i + 1..] {
                assert_ne!(a.code, b.code);
            }
        }
    }

    #[test]
    fn test_fallback_rates_parse_and_are_positive() {
        for c in CURRENCIES {
            let rate = Decimal::from_str(c.fallback_rate).unwrap();
            assert!(rate > Decimal::ZERO, "{} has a non-positive rate", c.code);
        }
    }

    #[test]
    fn test_base_and_starters_are_supported() {
        assert!(lookup(BASE_CURRENCY).is_some());
        for code in STARTER_CURRENCIES {
            assert!(lookup(code).is_some());
        }
    }
}
