//! Export command - write `;`-separated CSV

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;

use super::{get_context, parse_period, record};
use crate::output;
use bubble_core::services::{export_expense_recap, export_income_recap, export_transactions};
use bubble_core::LogEvent;

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportKind {
    /// Every transaction, one row per split
    Transactions,
    /// Expense recap blocks
    Expenses,
    /// Income recap rows
    Incomes,
}

pub async fn run(kind: ExportKind, output: Option<&Path>, period: Option<&str>) -> Result<()> {
    let ctx = get_context()?;
    let period = parse_period(period)?;

    let csv = match kind {
        ExportKind::Transactions => export_transactions(&ctx.transactions(&period).await?)?,
        ExportKind::Expenses => export_expense_recap(&ctx.recap(&period).await?.expense_blocks)?,
        ExportKind::Incomes => export_income_recap(&ctx.recap(&period).await?.income_rows)?,
    };

    // every export starts with a header line
    let rows = csv.lines().count().saturating_sub(1);
    record(LogEvent::export_written(rows).with_command("export"));

    match output {
        Some(path) => {
            std::fs::write(path, csv)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            output::success(&format!("Exported to {}", path.display()));
        }
        None => print!("{}", csv),
    }
    Ok(())
}
