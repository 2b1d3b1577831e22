//! Recap command - net spending per category and income per category

use anyhow::Result;
use colored::Colorize;
use comfy_table::Cell;

use super::{get_context, parse_period};
use crate::output;

pub async fn run(period: Option<&str>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let period = parse_period(period)?;
    let recap = ctx.recap(&period).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recap)?);
        return Ok(());
    }

    println!("{} ({})", "Expenses".bold(), period);
    for block in &recap.expense_blocks {
        let mut table = output::create_table();
        table.set_header(vec![
            Cell::new(&block.title),
            Cell::new(output::money(block.total)),
            Cell::new("Lines"),
        ]);
        for row in &block.rows {
            table.add_row(vec![
                Cell::new(&row.subcategory),
                output::money_cell(row.total),
                Cell::new(row.count),
            ]);
        }
        println!("{}", table);
    }
    if !recap.uncategorized_expenses.is_zero() {
        output::warning(&format!(
            "Uncategorized expenses: {}",
            output::money(recap.uncategorized_expenses)
        ));
    }
    println!();

    println!("{}", "Incomes".bold());
    let mut table = output::create_table();
    table.set_header(vec!["Category", "Total", "Lines"]);
    for row in &recap.income_rows {
        table.add_row(vec![
            Cell::new(&row.category),
            output::money_cell(row.total),
            Cell::new(row.count),
        ]);
    }
    println!("{}", table);
    println!();

    println!("  Total expenses: {}", output::money(recap.total_expenses));
    println!("  Total incomes:  {}", output::money(recap.total_incomes));
    println!("  Net:            {}", output::signed_money(recap.net));
    Ok(())
}
