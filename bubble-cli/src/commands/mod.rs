//! CLI command implementations

pub mod add;
pub mod categorize;
pub mod dedupe;
pub mod doctor;
pub mod export;
pub mod import;
pub mod list;
pub mod logs;
pub mod overview;
pub mod recap;
pub mod reset;
pub mod split;
pub mod status;

use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use bubble_core::services::Period;
use bubble_core::{BubbleContext, EntryPoint, LogEvent, LoggingService};

static EVENT_LOG: OnceLock<Option<LoggingService>> = OnceLock::new();

/// The process-wide event log, opened on first use
///
/// None when it cannot be opened; commands still run without it.
pub fn event_log() -> Option<&'static LoggingService> {
    EVENT_LOG
        .get_or_init(|| {
            let opened = get_bubble_dir().and_then(|dir| {
                std::fs::create_dir_all(&dir)?;
                LoggingService::new(&dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
            });
            match opened {
                Ok(log) => Some(log),
                Err(e) => {
                    tracing::debug!(error = %e, "event log unavailable");
                    None
                }
            }
        })
        .as_ref()
}

/// Record an event; a failing event log never fails the command
pub fn record(event: LogEvent) {
    if let Some(log) = event_log() {
        if let Err(e) = log.log(event) {
            tracing::debug!(error = %e, "event not recorded");
        }
    }
}

/// Data directory: `$BUBBLE_DIR` or `~/.bubble`
pub fn get_bubble_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("BUBBLE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(".bubble"))
}

/// Open the bubble context
pub fn get_context() -> Result<BubbleContext> {
    let bubble_dir = get_bubble_dir()?;
    BubbleContext::new(&bubble_dir).context("Failed to initialize bubble context")
}

/// Parse the optional `--period` argument
pub fn parse_period(period: Option<&str>) -> Result<Period> {
    match period {
        Some(p) => Ok(p.parse()?),
        None => Ok(Period::All),
    }
}
