//! Row normalization: raw CSV rows to transactions

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{Identity, RawRow, Transaction};

use super::locale::{parse_amount, parse_date};
use super::mapping::{ColumnField, ColumnMapping};

/// Amounts at or below this magnitude are treated as zero rows and dropped
pub const ZERO_AMOUNT_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// A normalized row with its parse-quality flags
#[derive(Debug, Clone)]
pub struct NormalizedRow {
    pub transaction: Transaction,
    pub date_fallback: bool,
    pub amount_fallback: bool,
}

/// Outcome of normalizing a whole file
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizeReport {
    pub transactions: Vec<Transaction>,
    /// Rows dropped because their amount was zero
    pub zero_dropped: usize,
    /// Kept rows whose date was not recognized
    pub date_fallbacks: usize,
    /// Rows whose amount was not recognized (read as zero, so also dropped)
    pub amount_fallbacks: usize,
}

fn cell<'a>(row: &'a RawRow, mapping: &ColumnMapping, field: ColumnField) -> Option<&'a str> {
    mapping.header(field).and_then(|h| row.get(h))
}

/// Normalize one row, keeping track of which cells needed a fallback
pub fn normalize_row(row: &RawRow, mapping: &ColumnMapping) -> NormalizedRow {
    let date = parse_date(cell(row, mapping, ColumnField::Date));
    let amount = parse_amount(cell(row, mapping, ColumnField::Amount));
    let description = cell(row, mapping, ColumnField::Description)
        .unwrap_or_default()
        .trim()
        .to_string();

    let movement_cell = cell(row, mapping, ColumnField::MovementId);
    let id = match movement_cell.map(str::trim).filter(|m| !m.is_empty()) {
        Some(movement) => Identity::new(movement),
        None => Identity::from_content(&date.value, amount.value, &description),
    };

    let mut transaction = Transaction::new(id, date.value, description, amount.value);
    transaction.currency = cell(row, mapping, ColumnField::Currency).map(str::to_string);
    transaction.counterparty = cell(row, mapping, ColumnField::Counterparty).map(str::to_string);
    transaction.movement_id = movement_cell.map(str::to_string);
    transaction.raw = row.clone();

    NormalizedRow {
        transaction,
        date_fallback: date.fallback,
        amount_fallback: amount.fallback,
    }
}

/// Normalize one row
pub fn normalize(row: &RawRow, mapping: &ColumnMapping) -> Transaction {
    normalize_row(row, mapping).transaction
}

/// Normalize a file, dropping zero-amount rows and counting fallbacks
pub fn normalize_batch(rows: &[RawRow], mapping: &ColumnMapping) -> NormalizeReport {
    let mut report = NormalizeReport::default();

    for (index, row) in rows.iter().enumerate() {
        let normalized = normalize_row(row, mapping);
        if normalized.amount_fallback {
            tracing::debug!(row = index + 1, "amount not recognized");
            report.amount_fallbacks += 1;
        }
        if normalized.transaction.amount.abs() <= ZERO_AMOUNT_EPSILON {
            report.zero_dropped += 1;
            continue;
        }
        if normalized.date_fallback {
            tracing::debug!(row = index + 1, "date not recognized, kept verbatim");
            report.date_fallbacks += 1;
        }
        report.transactions.push(normalized.transaction);
    }

    report
}

/// Normalize a file, dropping zero-amount rows
pub fn normalize_all(rows: &[RawRow], mapping: &ColumnMapping) -> Vec<Transaction> {
    normalize_batch(rows, mapping).transactions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CONTENT_IDENTITY_MAX_CHARS;

    fn mapping() -> ColumnMapping {
        ColumnMapping {
            date: "Date".to_string(),
            description: "Libellés".to_string(),
            amount: "Montant".to_string(),
            currency: "Devise".to_string(),
            counterparty: String::new(),
            movement_id: "Mouvement".to_string(),
        }
    }

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_movement_id_is_identity() {
        let r = row(&[
            ("Date", "05/08/2024"),
            ("Libellés", "  Coffee  "),
            ("Montant", "-4,50"),
            ("Devise", "EUR"),
            ("Mouvement", " MV-001 "),
        ]);
        let tx = normalize(&r, &mapping());
        assert_eq!(tx.id.as_str(), "MV-001");
        assert_eq!(tx.date, "2024-08-05");
        assert_eq!(tx.description, "Coffee");
        assert_eq!(tx.amount.to_string(), "-4.50");
        assert_eq!(tx.currency.as_deref(), Some("EUR"));
        assert_eq!(tx.movement_id.as_deref(), Some(" MV-001 "));
        assert!(tx.counterparty.is_none());
        assert_eq!(tx.raw, r);
    }

    #[test]
    fn test_content_identity_without_movement() {
        let r = row(&[("Date", "05/08/2024"), ("Libellés", "Coffee"), ("Montant", "-4,50")]);
        let a = normalize(&r, &mapping());
        let b = normalize(&r, &mapping());
        assert_eq!(a.id.as_str(), "2024-08-05|-4.5|Coffee");
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_blank_movement_falls_back_to_content() {
        let r = row(&[
            ("Date", "2024-08-05"),
            ("Libellés", "Rent"),
            ("Montant", "1.000,00"),
            ("Mouvement", "   "),
        ]);
        assert_eq!(normalize(&r, &mapping()).id.as_str(), "2024-08-05|1000|Rent");
    }

    #[test]
    fn test_long_descriptions_collide_after_truncation() {
        // Known boundary: the content key keeps only its first 120 characters
        let prefix = "x".repeat(150);
        let a = row(&[
            ("Date", "2024-08-05"),
            ("Libellés", &format!("{}A", prefix)),
            ("Montant", "-1"),
        ]);
        let b = row(&[
            ("Date", "2024-08-05"),
            ("Libellés", &format!("{}B", prefix)),
            ("Montant", "-1"),
        ]);
        let ta = normalize(&a, &mapping());
        let tb = normalize(&b, &mapping());
        assert_eq!(ta.id.as_str().chars().count(), CONTENT_IDENTITY_MAX_CHARS);
        assert_eq!(ta.id, tb.id);
        assert_ne!(ta.description, tb.description);
    }

    #[test]
    fn test_batch_drops_zero_rows_and_counts_fallbacks() {
        let rows = vec![
            row(&[("Date", "05/08/2024"), ("Libellés", "Coffee"), ("Montant", "-4,50")]),
            row(&[("Date", "05/08/2024"), ("Libellés", "Nothing"), ("Montant", "0,00")]),
            row(&[("Date", "05/08/2024"), ("Libellés", "Garbage"), ("Montant", "n/a")]),
            row(&[("Date", "yesterday"), ("Libellés", "Salary"), ("Montant", "2.500,00")]),
        ];
        let report = normalize_batch(&rows, &mapping());
        assert_eq!(report.transactions.len(), 2);
        assert_eq!(report.zero_dropped, 2);
        assert_eq!(report.date_fallbacks, 1);
        // unreadable amounts become zero and are dropped
        assert_eq!(report.amount_fallbacks, 1);
        assert_eq!(report.transactions[1].date, "yesterday");

        assert_eq!(normalize_all(&rows, &mapping()).len(), 2);
    }

    #[test]
    fn test_unmapped_description_is_empty() {
        let mut m = mapping();
        m.description = String::new();
        let r = row(&[("Date", "05/08/2024"), ("Libellés", "Coffee"), ("Montant", "-1")]);
        assert_eq!(normalize(&r, &m).description, "");
    }
}
