//! Monetary Values
//!
//! Prices and order totals are held as integer cents so that sums never pick up
//! floating point drift. The store keeps them as decimals; values cross the
//! `QueryExecutor` boundary as text (`"3.50"`, `"3.5"`, `"2"`) and are parsed here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CafeError, Result};

/// Non-negative amount of money in cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Create from cents
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Parse a decimal string with at most two fractional digits
    ///
    /// Accepts `"3"`, `"3.5"`, `"3.50"` and `".75"`. Negative amounts, more than two
    /// fractional digits and anything that is not a plain decimal are rejected.
    pub fn parse(input: &str) -> Result<Self> {
        let text = input.trim();
        let invalid = || CafeError::validation(format!("'{input}' is not a valid price"));

        if text.is_empty() {
            return Err(CafeError::validation("price cannot be empty"));
        }
        if text.starts_with('-') {
            return Err(CafeError::validation(format!("price cannot be negative: {text}")));
        }

        let text = text.strip_prefix('+').unwrap_or(text);
        let (whole, fraction) = match text.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (text, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        // Trailing zeros past the cents are insignificant ("3.500" == "3.50")
        let fraction = fraction.trim_end_matches('0');
        if fraction.len() > 2 {
            return Err(CafeError::validation(format!(
                "price has more than two decimal places: {text}"
            )));
        }

        let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
        let cents: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse::<i64>().map_err(|_| invalid())?,
        };

        whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(cents))
            .map(Self)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Money {
    type Err = CafeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_store_renderings() {
        // Postgres NUMERIC(8,2)
        assert_eq!(Money::parse("3.50").unwrap(), Money::from_cents(350));
        // SQLite REAL / INTEGER affinity
        assert_eq!(Money::parse("3.5").unwrap(), Money::from_cents(350));
        assert_eq!(Money::parse("2").unwrap(), Money::from_cents(200));
        assert_eq!(Money::parse("2.0").unwrap(), Money::from_cents(200));
    }

    #[test]
    fn test_parse_user_input() {
        assert_eq!(Money::parse(" 2.25 ").unwrap(), Money::from_cents(225));
        assert_eq!(Money::parse(".75").unwrap(), Money::from_cents(75));
        assert_eq!(Money::parse("0").unwrap(), Money::default());
        assert_eq!(Money::parse("10.").unwrap(), Money::from_cents(1000));
    }

    #[test]
    fn test_parse_rejects_bad_prices() {
        for bad in ["", "-1", "abc", "1.2.3", "1.234", ".", "1e3", "$4"] {
            let err = Money::parse(bad).unwrap_err();
            assert_eq!(err.error_code(), "VALIDATION_ERROR", "input {bad:?}");
        }
    }

    #[test]
    fn test_display_always_two_decimals() {
        assert_eq!(Money::from_cents(350).to_string(), "3.50");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(200).to_string(), "2.00");
    }
}
