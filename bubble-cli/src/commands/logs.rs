//! Logs command - inspect and prune the event log

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use clap::Subcommand;
use colored::Colorize;

use super::{event_log, get_bubble_dir};
use crate::output;
use bubble_core::services::{LogEntry, LogFilter};
use bubble_core::LoggingService;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent events
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Only failed commands
        #[arg(long, conflicts_with = "event")]
        errors: bool,
        /// Only one event, e.g. import_committed or duplicates_removed
        #[arg(long)]
        event: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete old events
    Clear {
        /// Keep the last N days
        #[arg(long, default_value = "30")]
        older_than_days: u64,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show event log size and location
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn open_log() -> Result<&'static LoggingService> {
    let dir = get_bubble_dir()?;
    event_log().with_context(|| {
        format!(
            "Failed to open the event log in {} (RUST_LOG=debug shows why)",
            dir.display()
        )
    })
}

fn local_time(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp_ms.to_string(),
    }
}

fn print_entries(entries: &[LogEntry]) {
    let mut table = output::create_table();
    table.set_header(vec!["Time", "Event", "Command", "Count", "Error"]);
    for entry in entries {
        table.add_row(vec![
            local_time(entry.timestamp),
            entry.event.clone(),
            entry.command.clone().unwrap_or_default(),
            entry.count.map(|c| c.to_string()).unwrap_or_default(),
            entry.error_message.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", table);
}

pub fn run(command: LogsCommands) -> Result<()> {
    let log = open_log()?;

    match command {
        LogsCommands::List {
            limit,
            errors,
            event,
            json,
        } => {
            let filter = match event {
                Some(name) => LogFilter::Event(name),
                None if errors => LogFilter::Errors,
                None => LogFilter::All,
            };
            let entries = log.entries(&filter, limit)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No log entries found.");
            } else {
                print_entries(&entries);
                if let LogFilter::Event(name) = &filter {
                    let records: i64 = entries.iter().filter_map(|e| e.count).sum();
                    println!();
                    println!("{} x {}, {} records", entries.len(), name, records);
                }
                let failed = entries.iter().filter(|e| e.error_message.is_some()).count();
                if failed > 0 && !errors {
                    println!();
                    println!("{} (see --errors)", format!("{} failed", failed).red());
                }
            }
        }
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => {
            let confirmed = force
                || json
                || dialoguer::Confirm::new()
                    .with_prompt(format!("Delete log entries older than {} days?", older_than_days))
                    .default(false)
                    .interact()?;
            if !confirmed {
                println!("Cancelled.");
                return Ok(());
            }

            let deleted = log.prune(older_than_days)?;
            if json {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else {
                output::success(&format!("Deleted {} log entries", deleted));
            }
        }
        LogsCommands::Stats { json } => {
            let stats = log.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", "Event log".bold());
                println!("  Entries:  {}", stats.total_entries);
                println!("  Errors:   {}", stats.error_count);
                println!("  Database: {}", stats.database_path.display());
                println!("  Size:     {}", output::format_size(stats.database_size_bytes));
            }
        }
    }

    Ok(())
}
