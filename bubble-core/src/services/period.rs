//! Period filtering on transaction dates
//!
//! Dates are compared as text, so fallback (non-ISO) dates only ever match
//! `All` and ranges they happen to sort into.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::result::Error;
use crate::domain::Transaction;

const OPEN_START: &str = "0000-00-00";
const OPEN_END: &str = "9999-12-31";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Period {
    #[default]
    All,
    /// `YYYY-MM`
    Month(String),
    /// `YYYY`
    Year(String),
    /// Inclusive ISO bounds; a missing bound is open
    Range {
        from: Option<String>,
        to: Option<String>,
    },
}

fn prefix(date: &str, chars: usize) -> String {
    date.chars().take(chars).collect()
}

impl Period {
    pub fn contains(&self, date: &str) -> bool {
        match self {
            Period::All => true,
            Period::Month(ym) => prefix(date, 7) == *ym,
            Period::Year(y) => prefix(date, 4) == *y,
            Period::Range { from, to } => {
                let from = from.as_deref().filter(|s| !s.is_empty()).unwrap_or(OPEN_START);
                let to = to.as_deref().filter(|s| !s.is_empty()).unwrap_or(OPEN_END);
                date >= from && date <= to
            }
        }
    }

    /// Keep the transactions dated inside the period
    pub fn filter(&self, txs: &[Transaction]) -> Vec<Transaction> {
        txs.iter().filter(|t| self.contains(&t.date)).cloned().collect()
    }
}

/// Parses `all`, `2024`, `2024-08`, or `from..to` with either side optional
impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(Period::All);
        }
        if let Some((from, to)) = s.split_once("..") {
            let bound = |b: &str| Some(b.trim().to_string()).filter(|b| !b.is_empty());
            return Ok(Period::Range {
                from: bound(from),
                to: bound(to),
            });
        }

        let digits = |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());
        match s.split_once('-') {
            None if digits(s, 4) => Ok(Period::Year(s.to_string())),
            Some((y, m)) if digits(y, 4) && digits(m, 2) => Ok(Period::Month(s.to_string())),
            _ => Err(Error::validation(format!(
                "Invalid period '{}': use all, YYYY, YYYY-MM or FROM..TO",
                s
            ))),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::All => f.write_str("all"),
            Period::Month(ym) => f.write_str(ym),
            Period::Year(y) => f.write_str(y),
            Period::Range { from, to } => write!(
                f,
                "{}..{}",
                from.as_deref().unwrap_or_default(),
                to.as_deref().unwrap_or_default()
            ),
        }
    }
}

/// Distinct years found in the data, most recent first
pub fn available_years(txs: &[Transaction]) -> Vec<String> {
    let years: BTreeSet<String> = txs.iter().map(|t| prefix(&t.date, 4)).collect();
    years.into_iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Identity;
    use rust_decimal::Decimal;

    fn tx(id: &str, date: &str) -> Transaction {
        Transaction::new(Identity::new(id), date, id, Decimal::new(-1, 0))
    }

    fn ids(txs: &[Transaction]) -> Vec<&str> {
        txs.iter().map(|t| t.id.as_str()).collect()
    }

    fn sample() -> Vec<Transaction> {
        vec![
            tx("a", "2023-12-31"),
            tx("b", "2024-01-15"),
            tx("c", "2024-08-05"),
            tx("d", "garbage"),
        ]
    }

    #[test]
    fn test_filter_modes() {
        let txs = sample();
        assert_eq!(Period::All.filter(&txs).len(), 4);
        assert_eq!(ids(&Period::Year("2024".into()).filter(&txs)), vec!["b", "c"]);
        assert_eq!(ids(&Period::Month("2024-08".into()).filter(&txs)), vec!["c"]);

        let range = Period::Range {
            from: Some("2023-12-31".into()),
            to: Some("2024-01-15".into()),
        };
        assert_eq!(ids(&range.filter(&txs)), vec!["a", "b"]);
    }

    #[test]
    fn test_open_range_bounds() {
        let txs = sample();
        let until = Period::Range {
            from: None,
            to: Some("2023-12-31".into()),
        };
        assert_eq!(ids(&until.filter(&txs)), vec!["a"]);

        let since = Period::Range {
            from: Some("2024-01-01".into()),
            to: None,
        };
        // "garbage" sorts after every ISO date
        assert_eq!(ids(&since.filter(&txs)), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_parse() {
        assert_eq!("all".parse::<Period>().unwrap(), Period::All);
        assert_eq!("2024".parse::<Period>().unwrap(), Period::Year("2024".into()));
        assert_eq!("2024-08".parse::<Period>().unwrap(), Period::Month("2024-08".into()));
        assert_eq!(
            "..2024-03-31".parse::<Period>().unwrap(),
            Period::Range {
                from: None,
                to: Some("2024-03-31".into())
            }
        );
        assert!("August".parse::<Period>().is_err());
        assert!("2024-8".parse::<Period>().is_err());
    }

    #[test]
    fn test_available_years() {
        assert_eq!(available_years(&sample()), vec!["garb", "2024", "2023"]);
        assert!(available_years(&[]).is_empty());
    }
}
