//! Status command - show store status and summary

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;

pub async fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status().await?;
    let db_size = ctx.store.db_size().unwrap_or(0);

    if json {
        let mut value = serde_json::to_value(&status)?;
        value["database_size_bytes"] = db_size.into();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", "Bubble Status".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Transactions".to_string(), status.total_transactions.to_string()]);
    table.add_row(vec!["Categorized".to_string(), status.categorized.to_string()]);
    table.add_row(vec!["Uncategorized".to_string(), status.uncategorized.to_string()]);
    table.add_row(vec!["Split".to_string(), status.split_transactions.to_string()]);
    table.add_row(vec!["Refunds".to_string(), status.refunds.to_string()]);
    table.add_row(vec!["Manual".to_string(), status.manual_transactions.to_string()]);
    table.add_row(vec!["Database size".to_string(), output::format_size(db_size)]);
    println!("{}", table);
    println!();

    if let (Some(earliest), Some(latest)) = (&status.date_range.earliest, &status.date_range.latest) {
        println!("Date range: {} to {}", earliest, latest);
    }
    if !status.years.is_empty() {
        println!("Years:    {}", status.years.join(", "));
    }
    println!("Incomes:  {}", output::money(status.totals.incomes));
    println!("Expenses: {}", output::money(status.totals.expenses));
    println!("Net:      {}", output::signed_money(status.totals.net));

    Ok(())
}
