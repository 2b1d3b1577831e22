//! Add command - enter a transaction by hand

use anyhow::Result;
use clap::{Args, ValueEnum};

use super::list::describe;
use super::{get_context, record};
use crate::output;
use bubble_core::services::{EntryKind, ManualEntry};
use bubble_core::LogEvent;

#[derive(Clone, Copy, ValueEnum)]
pub enum Kind {
    Expense,
    Income,
    Refund,
}

impl From<Kind> for EntryKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Expense => EntryKind::Expense,
            Kind::Income => EntryKind::Income,
            Kind::Refund => EntryKind::Refund,
        }
    }
}

#[derive(Args)]
pub struct AddArgs {
    /// Kind of transaction
    #[arg(value_enum)]
    pub kind: Kind,
    /// Amount without sign, e.g. 12,50
    #[arg(long, allow_hyphen_values = true)]
    pub amount: String,
    /// Description
    #[arg(long)]
    pub description: String,
    /// Date as DD/MM/YYYY or YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub date: Option<String>,
    /// Expense or income category, or the refunded category
    #[arg(long)]
    pub category: Option<String>,
    /// Subcategory
    #[arg(long)]
    pub subcategory: Option<String>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: AddArgs) -> Result<()> {
    let ctx = get_context()?;
    let entry = ManualEntry {
        kind: args.kind.into(),
        date: args.date,
        description: args.description,
        amount: args.amount,
        category: args.category,
        subcategory: args.subcategory,
    };
    let tx = ctx.categorize_service.add_manual(entry).await?;
    record(LogEvent::manual_added().with_command("add"));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tx)?);
    } else {
        output::success(&format!(
            "Added {} {} {} -> {}",
            tx.date,
            tx.description,
            output::money(tx.amount),
            describe(&tx)
        ));
        println!("  ID: {}", tx.id);
    }
    Ok(())
}
