//! Exact monetary amounts.
//!
//! Amounts are stored as integer minor units (kopecks, cents) next to an
//! ISO 4217 code. Every supported currency uses two fractional digits.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

const MINOR_PER_MAJOR: i64 = 100;

/// An amount of money in a single currency.
///
/// Equality is exact: same currency and same number of minor units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor_units: i64,
    currency: String,
}

impl Money {
    /// Creates an amount from minor units.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for negative amounts or a currency that
    /// is not a three-letter code.
    pub fn new(minor_units: i64, currency: &str) -> Result<Self, ValidationError> {
        if minor_units < 0 {
            return Err(ValidationError::out_of_range(
                "amount",
                0,
                i64::MAX,
                minor_units,
            ));
        }
        Ok(Self {
            minor_units,
            currency: normalize_currency(currency)?,
        })
    }

    /// Parses a gateway decimal string such as `"500.00"` or `"499.5"`.
    ///
    /// More than two fractional digits is rejected rather than rounded.
    pub fn parse_decimal(value: &str, currency: &str) -> Result<Self, ValidationError> {
        let value = value.trim();
        let (whole, fraction) = match value.split_once('.') {
            Some((w, f)) => (w, f),
            None => (value, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::invalid_format(
                "amount",
                format!("'{}' is not a decimal amount", value),
            ));
        }
        if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::invalid_format(
                "amount",
                format!("'{}' has more than two fractional digits", value),
            ));
        }

        let whole: i64 = whole
            .parse()
            .map_err(|_| ValidationError::invalid_format("amount", "whole part overflows"))?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().unwrap_or(0) * 10,
            _ => fraction.parse::<i64>().unwrap_or(0),
        };

        let minor_units = whole
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|m| m.checked_add(fraction))
            .ok_or_else(|| ValidationError::invalid_format("amount", "amount overflows"))?;

        Self::new(minor_units, currency)
    }

    /// Amount in minor units.
    pub fn minor_units(&self) -> i64 {
        self.minor_units
    }

    /// Upper-case ISO 4217 code.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Formats the amount the way gateways expect it: `"500.00"`.
    pub fn to_decimal_string(&self) -> String {
        format!(
            "{}.{:02}",
            self.minor_units / MINOR_PER_MAJOR,
            self.minor_units % MINOR_PER_MAJOR
        )
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal_string(), self.currency)
    }
}

fn normalize_currency(currency: &str) -> Result<String, ValidationError> {
    let code = currency.trim();
    if code.is_empty() {
        return Err(ValidationError::empty_field("currency"));
    }
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(ValidationError::invalid_format(
            "currency",
            format!("'{}' is not a three-letter code", code),
        ));
    }
    Ok(code.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_two_fractional_digits() {
        let money = Money::parse_decimal("500.00", "RUB").unwrap();
        assert_eq!(money.minor_units(), 50_000);
        assert_eq!(money.currency(), "RUB");
    }

    #[test]
    fn parses_whole_and_single_digit_fractions() {
        assert_eq!(Money::parse_decimal("7", "usd").unwrap().minor_units(), 700);
        assert_eq!(Money::parse_decimal("7.5", "usd").unwrap().minor_units(), 750);
    }

    #[test]
    fn rejects_sub_minor_precision() {
        assert!(Money::parse_decimal("1.005", "RUB").is_err());
    }

    #[test]
    fn rejects_signs_and_garbage() {
        assert!(Money::parse_decimal("-1.00", "RUB").is_err());
        assert!(Money::parse_decimal("1e3", "RUB").is_err());
        assert!(Money::parse_decimal(".50", "RUB").is_err());
        assert!(Money::parse_decimal("", "RUB").is_err());
    }

    #[test]
    fn currency_is_normalized_and_validated() {
        assert_eq!(Money::new(1, "rub").unwrap().currency(), "RUB");
        assert!(Money::new(1, "RUBLE").is_err());
        assert!(Money::new(1, "").is_err());
    }

    #[test]
    fn equality_is_currency_exact() {
        let rub = Money::new(50_000, "RUB").unwrap();
        let usd = Money::new(50_000, "USD").unwrap();
        assert_ne!(rub, usd);
        assert_ne!(rub, Money::new(49_999, "RUB").unwrap());
    }

    #[test]
    fn display_shows_decimal_and_code() {
        let money = Money::new(1_205, "EUR").unwrap();
        assert_eq!(money.to_string(), "12.05 EUR");
    }

    proptest! {
        #[test]
        fn gateway_format_parses_back_exactly(minor in 0i64..10_000_000_000) {
            let money = Money::new(minor, "RUB").unwrap();
            let parsed = Money::parse_decimal(&money.to_decimal_string(), "RUB").unwrap();
            prop_assert_eq!(parsed, money);
        }
    }
}
