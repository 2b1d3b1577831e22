//! List command - show transactions

use anyhow::Result;
use comfy_table::Cell;

use super::{get_context, parse_period};
use crate::output;
use bubble_core::{Classification, Transaction};

/// One-line description of a transaction's categorization
pub fn describe(tx: &Transaction) -> String {
    let with_sub = |c: &str, s: Option<&str>| match s {
        Some(s) => format!("{} / {}", c, s),
        None => c.to_string(),
    };
    match tx.classification() {
        Classification::Unclassified => "-".to_string(),
        Classification::Expense { category, subcategory } => with_sub(&category, subcategory.as_deref()),
        Classification::Split { splits } => format!("split ({} parts)", splits.len()),
        Classification::Income { category } => format!("income: {}", category),
        Classification::Refund { category, subcategory } => match category {
            Some(c) => format!("refund: {}", with_sub(&c, subcategory.as_deref())),
            None => "refund".to_string(),
        },
    }
}

pub async fn run(period: Option<&str>, uncategorized: bool, limit: usize, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let period = parse_period(period)?;
    let mut txs = ctx.transactions(&period).await?;
    if uncategorized {
        txs.retain(|t| t.classification() == Classification::Unclassified);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&txs)?);
        return Ok(());
    }

    if txs.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Date", "Amount", "Description", "Category", "ID"]);
    for tx in txs.iter().take(limit) {
        table.add_row(vec![
            Cell::new(&tx.date),
            output::money_cell(tx.amount),
            Cell::new(&tx.description),
            Cell::new(describe(tx)),
            Cell::new(tx.id.as_str()),
        ]);
    }
    println!("{}", table);
    if txs.len() > limit {
        println!("... and {} more (use --limit)", txs.len() - limit);
    }

    Ok(())
}
