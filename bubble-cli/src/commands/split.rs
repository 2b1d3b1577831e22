//! Split command - allocate an expense across categories

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;

use super::get_context;
use super::list::describe;
use crate::output;
use bubble_core::{Identity, Split};

/// Parse `amount:category[:subcategory]`
fn parse_part(part: &str) -> Result<Split> {
    let mut fields = part.splitn(3, ':');
    let amount = fields.next().unwrap_or_default().trim();
    let category = fields.next().map(str::trim).unwrap_or_default();
    if category.is_empty() {
        bail!("Invalid part '{}', expected AMOUNT:CATEGORY[:SUB]", part);
    }
    let amount: Decimal = amount
        .replace(',', ".")
        .parse()
        .with_context(|| format!("Invalid amount in part '{}'", part))?;
    let subcategory = fields.next().map(|s| s.trim().to_string());
    Ok(Split::new(amount, category, subcategory))
}

pub async fn run(id: &str, parts: &[String], clear: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let service = &ctx.categorize_service;
    let id = Identity::new(id);

    let tx = if clear {
        service.clear_splits(&id).await?
    } else {
        if parts.is_empty() {
            bail!("Give at least one --part, or --clear");
        }
        let splits = parts.iter().map(|p| parse_part(p)).collect::<Result<Vec<_>>>()?;
        service.set_splits(&id, splits).await?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&tx)?);
        return Ok(());
    }

    output::success(&format!("{} {} -> {}", tx.date, tx.description, describe(&tx)));
    if tx.has_splits() {
        let mut table = output::create_table();
        table.set_header(vec!["Amount", "Category", "Subcategory"]);
        for split in &tx.splits {
            table.add_row(vec![
                output::money_cell(split.amount),
                comfy_table::Cell::new(&split.category),
                comfy_table::Cell::new(split.subcategory.as_deref().unwrap_or("-")),
            ]);
        }
        println!("{}", table);
    }
    Ok(())
}
