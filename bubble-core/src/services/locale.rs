//! Lenient parsers for European-formatted statement cells
//!
//! Neither parser fails: unreadable input yields a fallback value and the
//! `fallback` flag, which the import report counts.

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

/// A parsed value and whether it is the best-effort fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parsed<T> {
    pub value: T,
    pub fallback: bool,
}

impl<T> Parsed<T> {
    fn exact(value: T) -> Self {
        Self {
            value,
            fallback: false,
        }
    }

    fn fallback(value: T) -> Self {
        Self {
            value,
            fallback: true,
        }
    }
}

fn number_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid regex")
    })
}

fn eu_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{2,4})$").expect("valid regex")
    })
}

fn iso_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"))
}

/// Parse an amount written with `.` thousands separators and a `,` decimal mark
///
/// Whitespace (including NBSP) and every `.` are dropped, `,` becomes the decimal
/// point, then the longest leading number is read; trailing garbage is ignored.
/// `"1.234,56"` -> `1234.56`, `"-12,3"` -> `-12.3`, `"abc"` -> `0` (fallback).
pub fn parse_amount(input: Option<&str>) -> Parsed<Decimal> {
    let Some(input) = input else {
        return Parsed::fallback(Decimal::ZERO);
    };

    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    let Some(prefix) = number_prefix().find(&cleaned) else {
        return Parsed::fallback(Decimal::ZERO);
    };
    match decimal_from_prefix(prefix.as_str()) {
        Some(value) => Parsed::exact(value),
        None => {
            tracing::warn!(amount = %input, "amount out of decimal range, using 0");
            Parsed::fallback(Decimal::ZERO)
        }
    }
}

fn decimal_from_prefix(prefix: &str) -> Option<Decimal> {
    let (mantissa, exponent) = match prefix.find(|c: char| c == 'e' || c == 'E') {
        Some(pos) => (&prefix[..pos], Some(&prefix[pos + 1..])),
        None => (prefix, None),
    };

    // "12." and ".5" are valid prefixes but not valid Decimal literals
    let (sign, digits) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa.strip_prefix('+').unwrap_or(mantissa)),
    };
    let digits = digits.trim_end_matches('.');
    let digits = if digits.starts_with('.') {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };

    match exponent {
        Some(exp) => Decimal::from_scientific(&format!("{}{}e{}", sign, digits, exp)).ok(),
        None => format!("{}{}", sign, digits).parse().ok(),
    }
}

/// Parse a `DD/MM/YYYY`-style date into ISO `YYYY-MM-DD`
///
/// `/`, `.` and `-` separate the parts; a two-digit year means 20yy. ISO input is
/// returned as is. Anything else is returned trimmed and flagged as a fallback.
/// Day and month ranges are not checked.
pub fn parse_date(input: Option<&str>) -> Parsed<String> {
    let s = input.unwrap_or_default().trim();
    if s.is_empty() {
        return Parsed::fallback(String::new());
    }

    if let Some(caps) = eu_date().captures(s) {
        let day = &caps[1];
        let month = &caps[2];
        let year = &caps[3];
        let year = if year.len() == 2 {
            // two ASCII digits always parse
            (2000 + year.parse::<u32>().unwrap_or_default()).to_string()
        } else {
            year.to_string()
        };
        return Parsed::exact(format!("{}-{:0>2}-{:0>2}", year, month, day));
    }

    if iso_date().is_match(s) {
        return Parsed::exact(s.to_string());
    }

    Parsed::fallback(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(s: &str) -> String {
        parse_amount(Some(s)).value.to_string()
    }

    #[test]
    fn test_parse_amount_european() {
        assert_eq!(amount("1.234,56"), "1234.56");
        assert_eq!(amount("-12,3"), "-12.3");
        assert_eq!(amount("-4,50"), "-4.50");
        assert_eq!(amount("1 234,56"), "1234.56");
        assert_eq!(amount("1\u{a0}234,56"), "1234.56");
        assert_eq!(amount("+7"), "7");
    }

    #[test]
    fn test_parse_amount_ignores_trailing_text() {
        assert_eq!(amount("12,50 EUR"), "12.50");
        assert_eq!(amount("3,"), "3");
        assert_eq!(amount(",5"), "0.5");
        assert!(!parse_amount(Some("12,50€")).fallback);
    }

    #[test]
    fn test_parse_amount_exponent() {
        assert_eq!(parse_amount(Some("1e3")).value, Decimal::new(1000, 0));
    }

    #[test]
    fn test_parse_amount_fallbacks() {
        for input in [None, Some(""), Some("abc"), Some("€12"), Some("-")] {
            let parsed = parse_amount(input);
            assert_eq!(parsed.value, Decimal::ZERO, "input {:?}", input);
            assert!(parsed.fallback, "input {:?}", input);
        }
    }

    #[test]
    fn test_parse_amount_out_of_range() {
        let huge = "9".repeat(40);
        for input in ["1e30", "-1e30", huge.as_str()] {
            let parsed = parse_amount(Some(input));
            assert_eq!(parsed.value, Decimal::ZERO, "input {:?}", input);
            assert!(parsed.fallback, "input {:?}", input);
        }
        // still in range
        assert!(!parse_amount(Some("1e20")).fallback);
    }

    #[test]
    fn test_parse_date_european() {
        assert_eq!(parse_date(Some("05/08/2024")).value, "2024-08-05");
        assert_eq!(parse_date(Some("5.8.24")).value, "2024-08-05");
        assert_eq!(parse_date(Some(" 31-12-2023 ")).value, "2023-12-31");
        assert!(!parse_date(Some("05/08/2024")).fallback);
    }

    #[test]
    fn test_parse_date_iso_passthrough() {
        let parsed = parse_date(Some("2024-08-05"));
        assert_eq!(parsed.value, "2024-08-05");
        assert!(!parsed.fallback);
    }

    #[test]
    fn test_parse_date_fallbacks() {
        let parsed = parse_date(Some("  Aug 5th "));
        assert_eq!(parsed.value, "Aug 5th");
        assert!(parsed.fallback);

        let parsed = parse_date(None);
        assert_eq!(parsed.value, "");
        assert!(parsed.fallback);

        assert_eq!(parse_date(Some("   ")).value, "");
    }

    #[test]
    fn test_parse_date_does_not_validate_ranges() {
        assert_eq!(parse_date(Some("45/13/2024")).value, "2024-13-45");
    }
}
