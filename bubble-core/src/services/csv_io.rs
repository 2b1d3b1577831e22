//! CSV reading and `;`-separated exports

use std::collections::HashSet;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{display_amount, Classification, RawRow, Transaction};

use super::aggregate::{ExpenseBlock, IncomeRow};

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Records sampled when guessing the delimiter
const DELIMITER_SAMPLE_ROWS: usize = 10;

/// A parsed CSV file: header row plus one map per data row
#[derive(Debug, Clone, Serialize)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    /// Delimiter of the data rows
    #[serde(serialize_with = "serialize_delimiter")]
    pub delimiter: u8,
}

fn serialize_delimiter<S: serde::Serializer>(d: &u8, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&(*d as char).to_string())
}

/// Field delimiters of a file, which may differ between header and data rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub header: u8,
    pub rows: u8,
}

/// Field counts of the first non-blank records when split on `delimiter`
fn sample_field_counts(text: &str, delimiter: u8) -> Vec<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    reader
        .records()
        .take(DELIMITER_SAMPLE_ROWS)
        .map_while(|r| r.ok())
        .filter(|r| !is_blank(r))
        .map(|r| r.len())
        .collect()
}

/// Guess the header and data row delimiters from the first records
///
/// The data rows decide: the candidate whose sampled rows all split into the
/// same field count wins, then one that also splits the header that way, then
/// the one giving the most fields. A file with only a header is judged on the
/// header. The header keeps the row delimiter unless another candidate splits
/// it into the row field count. Falls back to `,` when nothing splits.
pub fn detect_delimiters(text: &str) -> Delimiters {
    let samples: Vec<(u8, Vec<usize>)> = DELIMITER_CANDIDATES
        .iter()
        .map(|&d| (d, sample_field_counts(text, d)))
        .collect();

    let mut best: Option<((bool, bool, usize), u8, usize)> = None;
    for (delimiter, counts) in &samples {
        let data = match counts.get(1..) {
            Some(rows) if !rows.is_empty() => rows,
            _ => &counts[..],
        };
        let Some(&widest) = data.iter().max() else {
            continue;
        };
        if widest < 2 {
            continue;
        }
        let consistent = data.iter().all(|&c| c == widest);
        let header_agrees = counts.first() == Some(&widest);
        let score = (consistent, header_agrees, widest);
        if best.map_or(true, |(b, _, _)| score > b) {
            best = Some((score, *delimiter, widest));
        }
    }

    let Some((_, rows, width)) = best else {
        return Delimiters {
            header: b',',
            rows: b',',
        };
    };

    let header_width = |d: u8| {
        samples
            .iter()
            .find(|(c, _)| *c == d)
            .and_then(|(_, counts)| counts.first().copied())
    };
    let header = if header_width(rows) == Some(width) {
        rows
    } else {
        DELIMITER_CANDIDATES
            .into_iter()
            .find(|&d| header_width(d) == Some(width))
            .unwrap_or(rows)
    };

    Delimiters { header, rows }
}

/// Delimiter of the data rows, see [`detect_delimiters`]
pub fn detect_delimiter(text: &str) -> u8 {
    detect_delimiters(text).rows
}

fn is_blank(record: &csv::StringRecord) -> bool {
    record.iter().all(|f| f.trim().is_empty())
}

/// Make repeated header names unique (`Name`, `Name_1`, `Name_2`, ...)
fn unique_headers(headers: &csv::StringRecord) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .map(|h| {
            let mut name = h.to_string();
            let mut n = 1;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", h, n);
                n += 1;
            }
            name
        })
        .collect()
}

/// Parse CSV text: BOM stripped, delimiters detected, first row as headers
///
/// The header and the data rows are split with their own delimiter. Blank
/// records are skipped. Rows shorter than the header simply lack the missing
/// cells; extra cells are ignored.
pub fn read_csv(text: &str) -> Result<CsvTable> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let delimiters = detect_delimiters(text);

    let mut header_reader = csv::ReaderBuilder::new()
        .delimiter(delimiters.header)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut header_record = csv::StringRecord::new();
    if !header_reader.read_record(&mut header_record)? {
        return Err(Error::csv("file has no header row"));
    }
    let headers = unique_headers(&header_record);
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(Error::csv("file has no header row"));
    }

    let body_start = header_reader.position().byte() as usize;
    let body = text.get(body_start..).unwrap_or_default();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiters.rows)
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if is_blank(&record) {
            continue;
        }
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.clone(), v.to_string()))
                .collect(),
        );
    }

    tracing::debug!(
        rows = rows.len(),
        columns = headers.len(),
        header_delimiter = %(delimiters.header as char).escape_default(),
        delimiter = %(delimiters.rows as char).escape_default(),
        "read csv"
    );

    Ok(CsvTable {
        headers,
        rows,
        delimiter: delimiters.rows,
    })
}

/// Read a CSV file from disk
pub fn read_csv_file(path: &std::path::Path) -> Result<CsvTable> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes)
        .map_err(|_| Error::csv(format!("{} is not valid UTF-8", path.display())))?;
    read_csv(&text)
}

fn writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .delimiter(b';')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::csv(e.to_string()))
}

/// Total rounded to cents, printed in shortest form
fn format_total(total: Decimal) -> String {
    display_amount(total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

pub const TRANSACTION_EXPORT_HEADER: [&str; 11] = [
    "Type",
    "Date",
    "Description",
    "Amount",
    "Currency",
    "Counterparty",
    "Movement",
    "Category",
    "Subcategory",
    "Refund category",
    "Refund subcategory",
];

/// Categorized transactions, one row per split for split expenses
pub fn export_transactions(txs: &[Transaction]) -> Result<String> {
    let mut w = writer();
    w.write_record(TRANSACTION_EXPORT_HEADER)?;

    for tx in txs {
        let currency = tx.currency.as_deref().unwrap_or_default();
        let counterparty = tx.counterparty.as_deref().unwrap_or_default();
        let movement = tx.movement_id.as_deref().unwrap_or_default();

        let (kind, category, subcategory, refund_category, refund_subcategory) =
            match tx.classification() {
                Classification::Split { splits } => {
                    let description = format!("{} (split)", tx.description);
                    for split in &splits {
                        w.write_record([
                            "Expense (split)",
                            tx.date.as_str(),
                            description.as_str(),
                            display_amount(-split.amount.abs()).as_str(),
                            currency,
                            counterparty,
                            movement,
                            split.category.as_str(),
                            split.subcategory.as_deref().unwrap_or_default(),
                            "",
                            "",
                        ])?;
                    }
                    continue;
                }
                Classification::Expense {
                    category,
                    subcategory,
                } => ("Expense", category, subcategory.unwrap_or_default(), String::new(), String::new()),
                Classification::Income { category } => {
                    ("Income", category, String::new(), String::new(), String::new())
                }
                Classification::Refund {
                    category,
                    subcategory,
                } => (
                    "Refund",
                    String::new(),
                    String::new(),
                    category.unwrap_or_default(),
                    subcategory.unwrap_or_default(),
                ),
                Classification::Unclassified => {
                    let kind = if tx.is_inflow() { "Income" } else { "Expense" };
                    (kind, String::new(), String::new(), String::new(), String::new())
                }
            };

        w.write_record([
            kind,
            tx.date.as_str(),
            tx.description.as_str(),
            display_amount(tx.amount).as_str(),
            currency,
            counterparty,
            movement,
            category.as_str(),
            subcategory.as_str(),
            refund_category.as_str(),
            refund_subcategory.as_str(),
        ])?;
    }

    finish(w)
}

/// Expense recap: a header row per block, its subcategory rows, then a separator
pub fn export_expense_recap(blocks: &[ExpenseBlock]) -> Result<String> {
    let mut w = writer();
    w.write_record(["Category", "Subcategory", "Total", "Lines"])?;

    for block in blocks {
        w.write_record([block.title.as_str(), "", format_total(block.total).as_str(), ""])?;
        for row in &block.rows {
            w.write_record([
                "",
                row.subcategory.as_str(),
                format_total(row.total).as_str(),
                row.count.to_string().as_str(),
            ])?;
        }
        w.write_record(["", "—", "", ""])?;
    }

    finish(w)
}

/// Income recap: one row per income category
pub fn export_income_recap(rows: &[IncomeRow]) -> Result<String> {
    let mut w = writer();
    w.write_record(["Category", "Total", "Lines"])?;
    for row in rows {
        w.write_record([
            row.category.as_str(),
            format_total(row.total).as_str(),
            row.count.to_string().as_str(),
        ])?;
    }
    finish(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Identity, Split};
    use crate::services::aggregate::ExpenseRow;

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3\n"), b';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3\n"), b',');
        assert_eq!(detect_delimiter("a\tb\n1\t2\n"), b'\t');
        assert_eq!(detect_delimiter("a|b\n1|2\n"), b'|');
        assert_eq!(detect_delimiter("single\nvalue\n"), b',');
    }

    #[test]
    fn test_detect_delimiter_prefers_semicolon_with_decimal_commas() {
        // Comma splits the data rows unevenly, semicolon is consistent
        let text = "Date;Libellés;Montant\n05/08/2024;Coffee;-4,50\n06/08/2024;Tea;-3,00\n";
        assert_eq!(detect_delimiter(text), b';');
    }

    #[test]
    fn test_detect_delimiters_from_data_rows() {
        let text = "Date,Libellés,Montant\n05/08/2024;\"Coffee\";-4,50\n";
        assert_eq!(
            detect_delimiters(text),
            Delimiters {
                header: b',',
                rows: b';'
            }
        );
        assert_eq!(
            detect_delimiters("a;b;c\n1;2;3\n"),
            Delimiters {
                header: b';',
                rows: b';'
            }
        );
        // header only
        assert_eq!(detect_delimiter("a|b|c\n"), b'|');
    }

    #[test]
    fn test_read_csv_header_and_rows_with_different_delimiters() {
        let text = "Date,Libellés,Montant\n05/08/2024;\"Coffee\";-4,50\n";
        let table = read_csv(text).unwrap();
        assert_eq!(table.headers, vec!["Date", "Libellés", "Montant"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].get("Date"), Some("05/08/2024"));
        assert_eq!(table.rows[0].get("Libellés"), Some("Coffee"));
        assert_eq!(table.rows[0].get("Montant"), Some("-4,50"));
        assert_eq!(table.delimiter, b';');
    }

    #[test]
    fn test_read_csv_strips_bom_and_blank_rows() {
        let text = "\u{feff}Date;Libellés;Montant\n05/08/2024;\"Coffee; large\";-4,50\n;;\n\n";
        let table = read_csv(text).unwrap();
        assert_eq!(table.headers, vec!["Date", "Libellés", "Montant"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].get("Libellés"), Some("Coffee; large"));
        assert_eq!(table.delimiter, b';');
    }

    #[test]
    fn test_read_csv_short_rows_lack_cells() {
        let table = read_csv("a,b,c\n1,2\n1,2,3\n").unwrap();
        assert_eq!(table.rows[0].get("c"), None);
        assert_eq!(table.rows[1].get("c"), Some("3"));
    }

    #[test]
    fn test_read_csv_duplicate_headers() {
        let table = read_csv("Date;Date;Montant\n1;2;3\n").unwrap();
        assert_eq!(table.headers, vec!["Date", "Date_1", "Montant"]);
        assert_eq!(table.rows[0].get("Date_1"), Some("2"));
    }

    #[test]
    fn test_export_transactions_split_rows() {
        let mut tx = Transaction::new(
            Identity::new("t1"),
            "2024-08-05",
            "Dinner",
            "-100".parse().unwrap(),
        );
        tx.splits = vec![
            Split {
                id: "s1".into(),
                amount: "60".parse().unwrap(),
                category: "Event".into(),
                subcategory: Some("Catering".into()),
            },
            Split {
                id: "s2".into(),
                amount: "40".parse().unwrap(),
                category: "Local".into(),
                subcategory: None,
            },
        ];

        let out = export_transactions(&[tx]).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[1],
            "Expense (split);2024-08-05;Dinner (split);-60;;;;Event;Catering;;"
        );
        assert_eq!(lines[2], "Expense (split);2024-08-05;Dinner (split);-40;;;;Local;;;");
    }

    #[test]
    fn test_export_refund_row() {
        let mut tx = Transaction::new(Identity::new("r"), "2024-08-06", "Refund", "25.5".parse().unwrap());
        tx.is_refund = true;
        tx.refund_category = Some("Event".into());
        let out = export_transactions(&[tx]).unwrap();
        assert_eq!(
            out.lines().nth(1),
            Some("Refund;2024-08-06;Refund;25.5;;;;;;Event;")
        );
    }

    #[test]
    fn test_export_recaps() {
        let blocks = vec![ExpenseBlock {
            category: "Banque".into(),
            title: "Banque".into(),
            rows: vec![ExpenseRow {
                subcategory: "Total".into(),
                total: "12.345".parse().unwrap(),
                count: 2,
            }],
            total: "12.345".parse().unwrap(),
            to_classify: Decimal::ZERO,
        }];
        let out = export_expense_recap(&blocks).unwrap();
        assert_eq!(
            out,
            "Category;Subcategory;Total;Lines\nBanque;;12.35;\n;Total;12.35;2\n;—;;\n"
        );

        let rows = vec![IncomeRow {
            category: "MBU".into(),
            total: "100.00".parse().unwrap(),
            count: 1,
        }];
        assert_eq!(
            export_income_recap(&rows).unwrap(),
            "Category;Total;Lines\nMBU;100;1\n"
        );
    }
}
