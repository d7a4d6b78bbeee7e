//! Pure amount conversion over a rate table.
//!
//! None of these functions fail loudly: bad input (a blank or non-numeric
//! amount, a negative amount, an unknown currency, no table at all) yields
//! `None` so the caller can show an empty result instead of a misleading zero.

use crate::core::rates::RateTable;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Number of decimal places in a converted amount.
pub const AMOUNT_SCALE: u32 = 2;

/// Parses a user-entered amount. Only non-negative decimals are accepted.
pub fn parse_amount(amount: &str) -> Option<Decimal> {
    let amount = amount.trim();
    if amount.is_empty() {
        return None;
    }
    let value = Decimal::from_str(amount)
        .or_else(|_| Decimal::from_scientific(amount))
        .ok()?;
    if value.is_sign_negative() && !value.is_zero() {
        return None;
    }
    Some(value)
}

fn rate_of(table: &RateTable, code: &str) -> Option<Decimal> {
    table.get(code).and_then(Decimal::from_f64)
}

/// Converts `amount` from one currency to another, rounded half-up to cents.
pub fn convert_amount(
    amount: &str,
    from: &str,
    to: &str,
    table: Option<&RateTable>,
) -> Option<Decimal> {
    let table = table?;
    let amount = parse_amount(amount)?;
    let from_rate = rate_of(table, from)?;
    let to_rate = rate_of(table, to)?;
    if from_rate.is_zero() {
        return None;
    }

    let converted = amount.checked_div(from_rate)?.checked_mul(to_rate)?;
    let mut rounded =
        converted.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(AMOUNT_SCALE);
    Some(rounded)
}

/// Converts `amount` and renders it with exactly two decimals, e.g. `"90.00"`.
pub fn convert(amount: &str, from: &str, to: &str, table: Option<&RateTable>) -> Option<String> {
    convert_amount(amount, from, to, table).map(|v| v.to_string())
}

/// The rate that turns one unit of `from` into `to`: `table[to] / table[from]`.
pub fn effective_rate(from: &str, to: &str, table: &RateTable) -> Option<f64> {
    let from_rate = table.get(from)?;
    let to_rate = table.get(to)?;
    Some(to_rate / from_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn table(pairs: &[(&str, f64)]) -> RateTable {
        let rates: BTreeMap<String, f64> = pairs.iter().map(|(c, r)| (c.to_string(), *r)).collect();
        RateTable::new("USD", rates).unwrap()
    }

    #[test]
    fn test_convert_usd_eur_both_ways() {
        let t = table(&[("USD", 1.0), ("EUR", 0.9)]);
        assert_eq!(convert("100", "USD", "EUR", Some(&t)).as_deref(), Some("90.00"));
        assert_eq!(convert("90.00", "EUR", "USD", Some(&t)).as_deref(), Some("100.00"));
    }

    #[test]
    fn test_convert_cross_rate_through_base() {
        let t = table(&[("EUR", 0.8), ("GBP", 0.5)]);
        // 10 EUR -> 12.5 USD -> 6.25 GBP
        assert_eq!(convert("10", "EUR", "GBP", Some(&t)).as_deref(), Some("6.25"));
        assert_eq!(convert("0", "EUR", "GBP", Some(&t)).as_deref(), Some("0.00"));
    }

    #[test]
    fn test_convert_rounds_half_up() {
        let t = table(&[("EUR", 0.5)]);
        // 0.005 USD -> 0.0025 EUR -> 0.00, 0.01 USD -> 0.005 EUR -> 0.01
        assert_eq!(convert("0.005", "USD", "EUR", Some(&t)).as_deref(), Some("0.00"));
        assert_eq!(convert("0.01", "USD", "EUR", Some(&t)).as_deref(), Some("0.01"));
        assert_eq!(convert("2.345", "USD", "USD", Some(&t)).as_deref(), Some("2.35"));
    }

    #[test]
    fn test_convert_no_result_cases() {
        let t = table(&[("USD", 1.0), ("EUR", 0.9)]);
        assert!(convert("100", "USD", "EUR", None).is_none());
        assert!(convert("abc", "USD", "EUR", Some(&t)).is_none());
        assert!(convert("", "USD", "EUR", Some(&t)).is_none());
        assert!(convert("   ", "USD", "EUR", Some(&t)).is_none());
        assert!(convert("-5", "USD", "EUR", Some(&t)).is_none());
        assert!(convert("100", "JPY", "EUR", Some(&t)).is_none());
        assert!(convert("100", "USD", "JPY", Some(&t)).is_none());
    }

    #[test]
    fn test_convert_round_trip_within_a_cent() {
        let t = table(&[
            ("EUR", 0.92),
            ("GBP", 0.79),
            ("CHF", 0.88),
            ("CAD", 1.36),
            ("AUD", 1.52),
        ]);
        let codes: Vec<&str> = t.codes().collect();
        let cent = Decimal::new(1, 2);

        for amount in ["0.01", "1", "19.99", "250.5", "1234.56"] {
            for a in &codes {
                for b in &codes {
                    // The first rounding error is scaled by rates[a] / rates[b] on the
                    // way back, so the one-cent bound holds when that ratio is <= 1.
                    if t.get(b).unwrap() < t.get(a).unwrap() {
                        continue;
                    }
                    let there = convert(amount, a, b, Some(&t)).unwrap();
                    let back = convert_amount(&there, b, a, Some(&t)).unwrap();
                    let original = parse_amount(amount).unwrap();
                    assert!(
                        (back - original).abs() <= cent,
                        "{amount} {a}->{b}->{a} gave {back}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_parse_amount_accepts_common_forms() {
        assert_eq!(parse_amount(" 12.50 "), Some(Decimal::new(1250, 2)));
        assert_eq!(parse_amount("1e3"), Some(Decimal::new(1000, 0)));
        assert_eq!(parse_amount("-0"), Some(Decimal::ZERO));
        assert!(parse_amount("12,50").is_none());
    }

    #[test]
    fn test_effective_rate() {
        let t = table(&[("EUR", 0.9), ("GBP", 0.75)]);
        let rate = effective_rate("EUR", "GBP", &t).unwrap();
        assert!((rate - 0.75 / 0.9).abs() < 1e-12);
        assert!(effective_rate("EUR", "JPY", &t).is_none());
    }
}
