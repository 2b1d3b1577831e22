//! Bubble CLI - bank statement categorization in your terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use bubble_core::LogEvent;
use commands::{add, categorize, dedupe, doctor, export, import, list, logs, overview, recap, reset, split, status};

/// Bubble - import, categorize and recap bank statements
#[derive(Parser)]
#[command(name = "bubble", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import transactions from a CSV bank statement
    Import {
        /// Path to CSV file
        file: PathBuf,
        /// Preview without importing
        #[arg(long)]
        preview: bool,
        /// Column name for transaction date
        #[arg(long)]
        date_column: Option<String>,
        /// Column name for transaction description
        #[arg(long)]
        description_column: Option<String>,
        /// Column name for amount
        #[arg(long)]
        amount_column: Option<String>,
        /// Column name for currency
        #[arg(long)]
        currency_column: Option<String>,
        /// Column name for counterparty
        #[arg(long)]
        counterparty_column: Option<String>,
        /// Column name for the bank movement number
        #[arg(long)]
        movement_column: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List transactions
    List {
        /// Period: all, YYYY, YYYY-MM or FROM..TO
        #[arg(long, short)]
        period: Option<String>,
        /// Only transactions without any categorization
        #[arg(long)]
        uncategorized: bool,
        /// Maximum number of rows
        #[arg(long, short, default_value = "50")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Edit the categorization of a transaction
    Categorize(categorize::CategorizeArgs),

    /// Split an expense across categories
    Split {
        /// Transaction ID
        id: String,
        /// Part as amount:category[:subcategory], repeatable
        #[arg(long = "part", value_name = "AMOUNT:CATEGORY[:SUB]")]
        parts: Vec<String>,
        /// Remove the split instead
        #[arg(long, conflicts_with = "parts")]
        clear: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a transaction by hand
    Add(add::AddArgs),

    /// Show the expense and income recap
    Recap {
        /// Period: all, YYYY, YYYY-MM or FROM..TO
        #[arg(long, short)]
        period: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the budget overview (income, expenses, profit, VAT)
    Overview {
        /// Period: all, YYYY, YYYY-MM or FROM..TO
        #[arg(long, short)]
        period: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export transactions or recaps as `;`-separated CSV
    Export {
        /// What to export
        #[arg(value_enum)]
        kind: export::ExportKind,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Period: all, YYYY, YYYY-MM or FROM..TO
        #[arg(long, short)]
        period: Option<String>,
    },

    /// Merge and remove duplicate transactions
    Dedupe {
        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show store status and summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run data health checks
    Doctor {
        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete every stored transaction
    Reset {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Import { .. } => "import",
            Commands::List { .. } => "list",
            Commands::Categorize(_) => "categorize",
            Commands::Split { .. } => "split",
            Commands::Add(_) => "add",
            Commands::Recap { .. } => "recap",
            Commands::Overview { .. } => "overview",
            Commands::Export { .. } => "export",
            Commands::Dedupe { .. } => "dedupe",
            Commands::Status { .. } => "status",
            Commands::Doctor { .. } => "doctor",
            Commands::Reset { .. } => "reset",
            Commands::Logs { .. } => "logs",
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let command = cli.command.name();
    let result = run(cli).await;

    match result {
        Ok(()) => {
            commands::record(LogEvent::command_run(command));
            ExitCode::SUCCESS
        }
        Err(e) => {
            commands::record(LogEvent::command_failed(command, &e));
            eprintln!("{} {:#}", "error:".red().bold(), e);
            if is_rejected_input(&e) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Whether the command failed because its input was refused, not because of the store
fn is_rejected_input(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<bubble_core::Error>().is_some_and(|e| e.is_validation()))
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Import {
            file,
            preview,
            date_column,
            description_column,
            amount_column,
            currency_column,
            counterparty_column,
            movement_column,
            json,
        } => {
            let overrides = import::ColumnOverrides {
                date: date_column,
                description: description_column,
                amount: amount_column,
                currency: currency_column,
                counterparty: counterparty_column,
                movement_id: movement_column,
            };
            import::run(&file, overrides, preview, json).await
        }
        Commands::List { period, uncategorized, limit, json } => {
            list::run(period.as_deref(), uncategorized, limit, json).await
        }
        Commands::Categorize(args) => categorize::run(args).await,
        Commands::Split { id, parts, clear, json } => split::run(&id, &parts, clear, json).await,
        Commands::Add(args) => add::run(args).await,
        Commands::Recap { period, json } => recap::run(period.as_deref(), json).await,
        Commands::Overview { period, json } => overview::run(period.as_deref(), json).await,
        Commands::Export { kind, output, period } => {
            export::run(kind, output.as_deref(), period.as_deref()).await
        }
        Commands::Dedupe { dry_run, json } => dedupe::run(dry_run, json).await,
        Commands::Status { json } => status::run(json).await,
        Commands::Doctor { verbose, json } => doctor::run(verbose, json).await,
        Commands::Reset { force } => reset::run(force).await,
        Commands::Logs { command } => logs::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_rejected_input_exit() {
        let rejected: Result<()> = Err(bubble_core::Error::validation("Invalid amount: x").into());
        let rejected = rejected.context("Failed to add transaction").unwrap_err();
        assert!(is_rejected_input(&rejected));

        let store = anyhow::Error::from(bubble_core::Error::database("locked"));
        assert!(!is_rejected_input(&store));
        assert!(!is_rejected_input(&anyhow::anyhow!("plain")));
    }
}
