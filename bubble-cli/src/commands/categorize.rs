//! Categorize command - edit the categorization of one transaction

use anyhow::Result;
use clap::Args;

use super::get_context;
use super::list::describe;
use crate::output;
use bubble_core::Identity;

#[derive(Args)]
pub struct CategorizeArgs {
    /// Transaction ID
    pub id: String,
    /// Expense category ("" clears it)
    #[arg(long)]
    pub category: Option<String>,
    /// Expense subcategory ("" clears it)
    #[arg(long)]
    pub subcategory: Option<String>,
    /// Income category ("" clears it)
    #[arg(long, conflicts_with_all = ["category", "subcategory"])]
    pub income: Option<String>,
    /// Mark (true) or unmark (false) an inflow as a refund
    #[arg(long)]
    pub refund: Option<bool>,
    /// Category the refund is netted against
    #[arg(long)]
    pub refund_category: Option<String>,
    /// Subcategory the refund is netted against
    #[arg(long)]
    pub refund_subcategory: Option<String>,
    /// Remove every categorization first
    #[arg(long)]
    pub clear: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

fn optional(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}

pub async fn run(args: CategorizeArgs) -> Result<()> {
    let ctx = get_context()?;
    let service = &ctx.categorize_service;
    let id = Identity::new(args.id);

    let mut tx = if args.clear {
        service.clear(&id).await?
    } else {
        service.get(&id).await?
    };

    if let Some(refund) = args.refund {
        tx = service.set_refund(&id, refund).await?;
    }
    if let Some(category) = &args.category {
        tx = service.set_expense_category(&id, category).await?;
    }
    if let Some(sub) = &args.subcategory {
        tx = service.set_expense_subcategory(&id, optional(sub)).await?;
    }
    if let Some(category) = &args.income {
        tx = service.set_income_category(&id, category).await?;
    }
    if let Some(category) = &args.refund_category {
        tx = service.set_refund_category(&id, category).await?;
    }
    if let Some(sub) = &args.refund_subcategory {
        tx = service.set_refund_subcategory(&id, optional(sub)).await?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tx)?);
    } else {
        output::success(&format!("{} {} -> {}", tx.date, tx.description, describe(&tx)));
    }
    Ok(())
}
