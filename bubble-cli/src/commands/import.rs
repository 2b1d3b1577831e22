//! Import command - import transactions from CSV

use std::path::Path;

use anyhow::Result;

use super::{get_context, record};
use crate::output;
use bubble_core::services::{ColumnField, ColumnMapping};
use bubble_core::LogEvent;

/// Column names given on the command line
#[derive(Debug, Default)]
pub struct ColumnOverrides {
    pub date: Option<String>,
    pub description: Option<String>,
    pub amount: Option<String>,
    pub currency: Option<String>,
    pub counterparty: Option<String>,
    pub movement_id: Option<String>,
}

impl ColumnOverrides {
    fn apply(self, mapping: ColumnMapping) -> ColumnMapping {
        let pairs = [
            (ColumnField::Date, self.date),
            (ColumnField::Description, self.description),
            (ColumnField::Amount, self.amount),
            (ColumnField::Currency, self.currency),
            (ColumnField::Counterparty, self.counterparty),
            (ColumnField::MovementId, self.movement_id),
        ];
        mapping.with_overrides(pairs.into_iter().filter_map(|(f, h)| h.map(|h| (f, h))))
    }
}

fn print_mapping(mapping: &ColumnMapping) {
    output::info("Column mapping:");
    for field in ColumnField::ALL {
        let header = mapping.header(field).unwrap_or("-");
        println!("  {:<13} {}", field.as_str(), header);
    }
    println!();
}

pub async fn run(file: &Path, overrides: ColumnOverrides, preview: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let (table, guessed) = ctx.import_service.read(file)?;
    let mapping = overrides.apply(guessed);

    if preview {
        let preview = ctx.import_service.preview(&table, &mapping);
        if json {
            println!("{}", serde_json::to_string_pretty(&preview)?);
            return Ok(());
        }

        output::warning("PREVIEW MODE - No changes applied");
        println!();
        print_mapping(&mapping);

        if !preview.missing.is_empty() {
            output::warning(&format!(
                "Missing required columns: {} (use --{}-column)",
                preview.missing.join(", "),
                preview.missing[0]
            ));
            return Ok(());
        }

        let mut t = output::create_table();
        t.set_header(vec!["Date", "Amount", "Description", "ID"]);
        for tx in preview.transactions.iter().take(10) {
            t.add_row(vec![
                comfy_table::Cell::new(&tx.date),
                output::money_cell(tx.amount),
                comfy_table::Cell::new(&tx.description),
                comfy_table::Cell::new(tx.id.as_str()),
            ]);
        }
        println!("{}", t);
        if preview.transactions.len() > 10 {
            println!("... and {} more", preview.transactions.len() - 10);
        }

        println!();
        println!("  Rows: {}", preview.row_count);
        println!("  Transactions: {}", preview.transactions.len());
        println!("  Zero amounts dropped: {}", preview.zero_dropped);
        println!("  Unrecognized dates: {}", preview.date_fallbacks);
        println!("  Unrecognized amounts: {}", preview.amount_fallbacks);
        return Ok(());
    }

    if !json {
        print_mapping(&mapping);
    }

    let result = ctx.import_service.commit(&table, &mapping).await?;
    record(LogEvent::import_committed(&result).with_command("import"));
    if result.dedupe.deleted_count > 0 {
        record(LogEvent::duplicates_removed(&result.dedupe).with_command("import"));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    output::success("Import complete");
    println!();
    println!("  Imported: {}", result.imported);
    println!("  Already known: {}", result.matched_previous);
    println!("  Zero amounts dropped: {}", result.zero_dropped);
    if result.date_fallbacks > 0 {
        output::warning(&format!("  Unrecognized dates: {}", result.date_fallbacks));
    }
    if result.amount_fallbacks > 0 {
        output::warning(&format!("  Unrecognized amounts: {}", result.amount_fallbacks));
    }
    if result.dedupe.deleted_count > 0 {
        println!(
            "  Duplicates merged: {} ({} updated)",
            result.dedupe.deleted_count, result.dedupe.updated_count
        );
    }

    Ok(())
}
