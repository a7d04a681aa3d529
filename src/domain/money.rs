use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Money is represented as integer cents to avoid floating-point drift.
/// Every wallet currency uses two minor digits, so $50.00 = 5000 cents.
pub type Cents = i64;

/// Number of minor digits carried by every amount.
pub const MINOR_DIGITS: u32 = 2;

/// Format cents as a human-readable amount.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Parse a decimal string into cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
///
/// Inputs with more than two decimal places are rejected rather than
/// truncated, so a caller never moves a different amount than they typed.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseCentsError::InvalidFormat);
    }

    let value = Decimal::from_str(input).map_err(|_| ParseCentsError::InvalidFormat)?;
    if value.normalize().scale() > MINOR_DIGITS {
        return Err(ParseCentsError::TooPrecise);
    }

    decimal_to_cents(value).ok_or(ParseCentsError::OutOfRange)
}

/// View an amount in cents as a decimal in currency units (2 dp).
pub fn cents_to_decimal(cents: Cents) -> Decimal {
    Decimal::new(cents, MINOR_DIGITS)
}

/// Round a decimal amount to cents using half-up rounding.
/// Returns `None` if the value does not fit in `Cents`.
pub fn decimal_to_cents(value: Decimal) -> Option<Cents> {
    let rounded = round_to_minor(value);
    rounded.checked_mul(Decimal::ONE_HUNDRED)?.to_i64()
}

/// Round to the display precision (2 dp), midpoints away from zero.
pub fn round_to_minor(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MINOR_DIGITS, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCentsError {
    #[error("invalid money format")]
    InvalidFormat,
    #[error("amounts carry at most two decimal places")]
    TooPrecise,
    #[error("amount out of range")]
    OutOfRange,
}
