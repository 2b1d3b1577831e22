//! Event log in `logs.duckdb`
//!
//! Records what the application did (event and command names, record counts,
//! error text) so failures can be looked at after the fact. Descriptions,
//! amounts and counterparties never reach this log.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use duckdb::Connection;
use serde::{Deserialize, Serialize};

use super::dedupe::DedupeResult;
use super::import::ImportResult;
use super::migration::Migrator;

pub const LOG_DB_FILENAME: &str = "logs.duckdb";

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Milliseconds since the unix epoch
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    Library,
}

impl EntryPoint {
    fn as_str(self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Library => "library",
        }
    }
}

/// An event about to be written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    pub command: Option<String>,
    /// Records involved, e.g. imported or deleted
    pub count: Option<i64>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Self::default()
        }
    }

    pub fn with_command(self, command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..self
        }
    }

    pub fn with_count(self, count: usize) -> Self {
        Self {
            count: Some(count as i64),
            ..self
        }
    }

    pub fn with_error(self, message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..self
        }
    }

    /// Full cause chain of the error
    pub fn with_error_details(self, details: impl Into<String>) -> Self {
        Self {
            error_details: Some(details.into()),
            ..self
        }
    }

    /// A finished command
    pub fn command_run(command: &str) -> Self {
        Self::new("command_run").with_command(command)
    }

    /// A command that returned an error, with its message and cause chain
    pub fn command_failed(command: &str, err: &anyhow::Error) -> Self {
        Self::new("command_failed")
            .with_command(command)
            .with_error(err.to_string())
            .with_error_details(format!("{:#}", err))
    }

    /// Statement rows written by an import
    pub fn import_committed(result: &ImportResult) -> Self {
        Self::new("import_committed").with_count(result.imported)
    }

    /// Duplicates deleted by a dedupe pass
    pub fn duplicates_removed(result: &DedupeResult) -> Self {
        Self::new("duplicates_removed").with_count(result.deleted_count)
    }

    pub fn manual_added() -> Self {
        Self::new("manual_added").with_count(1)
    }

    pub fn export_written(rows: usize) -> Self {
        Self::new("export_written").with_count(rows)
    }

    pub fn store_reset(removed: usize) -> Self {
        Self::new("store_reset").with_count(removed)
    }
}

/// A stored event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    /// Unix milliseconds
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub command: Option<String>,
    pub count: Option<i64>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

impl LogEntry {
    fn from_row(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            timestamp: row.get("logged_at_ms")?,
            entry_point: row.get("entry_point")?,
            app_version: row.get("app_version")?,
            platform: row.get("os")?,
            event: row.get("event")?,
            command: row.get("command")?,
            count: row.get("item_count")?,
            error_message: row.get("error_message")?,
            error_details: row.get("error_details")?,
        })
    }
}

/// Which entries to read back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFilter {
    All,
    Errors,
    /// One event name, e.g. `import_committed`
    Event(String),
}

/// Size and content of the event log
#[derive(Debug, Clone, Serialize)]
pub struct LogStats {
    pub total_entries: u64,
    pub error_count: u64,
    pub database_path: PathBuf,
    pub database_size_bytes: u64,
}

pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
}

impl LoggingService {
    /// Open `logs.duckdb` in `dir`, creating and migrating it when needed
    pub fn new(dir: &Path, entry_point: EntryPoint, app_version: impl Into<String>) -> Result<Self> {
        let db_path = dir.join(LOG_DB_FILENAME);
        let conn = Connection::open(&db_path)?;
        Migrator::logs(&conn).run_pending()?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            entry_point,
            app_version: app_version.into(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("event log connection poisoned"))
    }

    pub fn log(&self, event: LogEvent) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO sys_logs (logged_at_ms, entry_point, app_version, os, event, command,
                item_count, error_message, error_details)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            duckdb::params![
                now_ms(),
                self.entry_point.as_str(),
                self.app_version,
                std::env::consts::OS,
                event.event,
                event.command,
                event.count,
                event.error_message,
                event.error_details,
            ],
        )?;
        Ok(())
    }

    /// Newest entries first
    pub fn entries(&self, filter: &LogFilter, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn()?;
        let limit = limit as i64;
        let entries = match filter {
            LogFilter::All => select(&conn, "", [limit])?,
            LogFilter::Errors => select(&conn, "WHERE error_message IS NOT NULL", [limit])?,
            LogFilter::Event(name) => {
                select(&conn, "WHERE event = ?", duckdb::params![name, limit])?
            }
        };
        Ok(entries)
    }

    /// Delete entries older than `days`
    pub fn prune(&self, days: u64) -> Result<u64> {
        let cutoff = now_ms() - days as i64 * DAY_MS;
        let deleted = self
            .conn()?
            .execute("DELETE FROM sys_logs WHERE logged_at_ms < ?", [cutoff])?;
        tracing::debug!(deleted, days, "pruned event log");
        Ok(deleted as u64)
    }

    pub fn stats(&self) -> Result<LogStats> {
        let (total, errors): (i64, i64) = self.conn()?.query_row(
            "SELECT COUNT(*), COUNT(error_message) FROM sys_logs",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(LogStats {
            total_entries: total as u64,
            error_count: errors as u64,
            database_path: self.db_path.clone(),
            database_size_bytes: std::fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0),
        })
    }
}

fn select(conn: &Connection, condition: &str, params: impl duckdb::Params) -> duckdb::Result<Vec<LogEntry>> {
    let sql = format!(
        "SELECT * FROM sys_logs {} ORDER BY logged_at_ms DESC, id DESC LIMIT ?",
        condition
    );
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt.query_map(params, LogEntry::from_row)?;
    entries.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> LoggingService {
        LoggingService::new(dir.path(), EntryPoint::Cli, "0.1.0").unwrap()
    }

    #[test]
    fn test_domain_events_carry_counts() {
        let dir = TempDir::new().unwrap();
        let log = open(&dir);

        let import = ImportResult {
            imported: 12,
            dedupe: DedupeResult {
                updated_count: 1,
                deleted_count: 2,
            },
            ..Default::default()
        };
        log.log(LogEvent::import_committed(&import).with_command("import")).unwrap();
        log.log(LogEvent::duplicates_removed(&import.dedupe).with_command("import"))
            .unwrap();
        log.log(LogEvent::command_run("import")).unwrap();

        let entries = log.entries(&LogFilter::All, 10).unwrap();
        let events: Vec<(&str, Option<i64>)> =
            entries.iter().map(|e| (e.event.as_str(), e.count)).collect();
        assert_eq!(
            events,
            vec![
                ("command_run", None),
                ("duplicates_removed", Some(2)),
                ("import_committed", Some(12)),
            ]
        );
        assert!(entries.iter().all(|e| e.command.as_deref() == Some("import")));

        let imports = log
            .entries(&LogFilter::Event("import_committed".to_string()), 10)
            .unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].count, Some(12));
        assert_eq!(entries[2].entry_point, "cli");
        assert_eq!(entries[2].app_version, "0.1.0");
        assert!(entries[0].id > entries[2].id);
    }

    #[test]
    fn test_error_filter_and_stats() {
        let dir = TempDir::new().unwrap();
        let log = open(&dir);

        log.log(LogEvent::store_reset(3)).unwrap();
        let err = anyhow!("missing: amount").context("Column mapping incomplete");
        log.log(LogEvent::command_failed("import", &err)).unwrap();

        let errors = log.entries(&LogFilter::Errors, 10).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_message.as_deref(), Some("Column mapping incomplete"));
        assert_eq!(
            errors[0].error_details.as_deref(),
            Some("Column mapping incomplete: missing: amount")
        );

        let stats = log.stats().unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.error_count, 1);
        assert!(stats.database_path.ends_with(LOG_DB_FILENAME));
    }

    #[test]
    fn test_prune_keeps_recent_entries() {
        let dir = TempDir::new().unwrap();
        let log = open(&dir);
        log.log(LogEvent::export_written(4)).unwrap();
        log.log(LogEvent::manual_added()).unwrap();

        // nothing is older than a day yet
        assert_eq!(log.prune(1).unwrap(), 0);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(log.prune(0).unwrap(), 2);
        assert_eq!(log.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        open(&dir).log(LogEvent::command_run("status")).unwrap();

        let log = LoggingService::new(dir.path(), EntryPoint::Library, "0.2.0").unwrap();
        log.log(LogEvent::command_run("status")).unwrap();
        let entries = log.entries(&LogFilter::All, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry_point, "library");
    }
}
