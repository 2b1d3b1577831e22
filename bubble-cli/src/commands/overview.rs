//! Overview command - budget view with VAT

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, Table};

use super::{get_context, parse_period};
use crate::output;
use bubble_core::services::{OverviewLine, VatAmount};

fn section(table: &mut Table, title: &str, lines: &[OverviewLine], total: VatAmount) {
    table.add_row(vec![Cell::new(title.bold()), Cell::new(""), Cell::new("")]);
    for line in lines {
        table.add_row(vec![
            Cell::new(format!("  {}", line.label)),
            output::money_cell(line.amount.incl_vat),
            output::money_cell(line.amount.excl_vat),
        ]);
    }
    table.add_row(vec![
        Cell::new(format!("Total {}", title.to_lowercase())),
        output::money_cell(total.incl_vat),
        output::money_cell(total.excl_vat),
    ]);
}

pub async fn run(period: Option<&str>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let period = parse_period(period)?;
    let overview = ctx.overview(&period).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    println!("{} ({})", "Budget overview".bold(), period);

    let mut table = output::create_table();
    table.set_header(vec!["", "Incl. VAT", "Excl. VAT"]);
    section(
        &mut table,
        "Operating income",
        &overview.operating_income,
        overview.operating_income_total,
    );
    section(
        &mut table,
        "Non-operating income",
        &overview.non_operating_income,
        overview.non_operating_income_total,
    );
    table.add_row(vec![
        Cell::new("Other income"),
        output::money_cell(overview.other_income.incl_vat),
        output::money_cell(overview.other_income.excl_vat),
    ]);
    table.add_row(vec![
        Cell::new("Income".bold()),
        output::money_cell(overview.income_total.incl_vat),
        output::money_cell(overview.income_total.excl_vat),
    ]);
    section(
        &mut table,
        "Operating expenses",
        &overview.operating_expenses,
        overview.operating_expenses_total,
    );
    section(
        &mut table,
        "Extra costs",
        &overview.extra_costs,
        overview.extra_costs_total,
    );
    table.add_row(vec![
        Cell::new("Expenses".bold()),
        output::money_cell(overview.expenses_total.incl_vat),
        output::money_cell(overview.expenses_total.excl_vat),
    ]);
    println!("{}", table);
    println!();

    println!("  Profit (VAT incl.):        {}", output::signed_money(overview.profit_incl_vat));
    println!(
        "  Profit (income excl. VAT): {}",
        output::signed_money(overview.profit_excl_vat_income)
    );
    Ok(())
}
