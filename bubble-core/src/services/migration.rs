//! Schema migrations for both DuckDB files
//!
//! Applied names are kept in `sys_migrations`. Every migration runs in its own
//! transaction together with its bookkeeping row, so a failing file leaves the
//! schema as it was before it.

use anyhow::{Context, Result};
use duckdb::Connection;

use crate::log_migrations::LOG_MIGRATIONS;
use crate::migrations::{Migration, MIGRATIONS};

const BOOKKEEPING: &str = "CREATE TABLE IF NOT EXISTS sys_migrations (
    migration_name VARCHAR PRIMARY KEY,
    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

/// What a migration run did
#[derive(Debug, Default, PartialEq)]
pub struct MigrationReport {
    pub applied: Vec<&'static str>,
    /// Migrations found already applied
    pub skipped: usize,
}

/// Applies one migration list to one connection
pub struct Migrator<'a> {
    conn: &'a Connection,
    migrations: &'static [Migration],
}

impl<'a> Migrator<'a> {
    /// Migrations of the transaction store
    pub fn store(conn: &'a Connection) -> Self {
        Self { conn, migrations: MIGRATIONS }
    }

    /// Migrations of the event log
    pub fn logs(conn: &'a Connection) -> Self {
        Self { conn, migrations: LOG_MIGRATIONS }
    }

    fn applied_names(&self) -> Result<Vec<String>> {
        self.conn.execute_batch(BOOKKEEPING)?;
        let mut stmt = self.conn.prepare("SELECT migration_name FROM sys_migrations")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(names)
    }

    /// Names not yet applied, in application order
    pub fn pending(&self) -> Result<Vec<&'static str>> {
        let applied = self.applied_names()?;
        Ok(self
            .migrations
            .iter()
            .map(|m| m.name)
            .filter(|name| !applied.iter().any(|a| a == name))
            .collect())
    }

    fn apply(&self, migration: &Migration) -> Result<()> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        let outcome = self.conn.execute_batch(migration.sql).and_then(|_| {
            self.conn.execute(
                "INSERT INTO sys_migrations (migration_name) VALUES (?)",
                [migration.name],
            )
        });
        match outcome {
            Ok(_) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(())
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e).with_context(|| format!("Migration {} failed", migration.name))
            }
        }
    }

    /// Apply every pending migration
    pub fn run_pending(&self) -> Result<MigrationReport> {
        let pending = self.pending()?;
        let mut report = MigrationReport {
            applied: Vec::new(),
            skipped: self.migrations.len() - pending.len(),
        };

        for migration in self.migrations.iter().filter(|m| pending.contains(&m.name)) {
            self.apply(migration)?;
            tracing::debug!(migration = migration.name, "applied migration");
            report.applied.push(migration.name);
        }
        Ok(report)
    }
}
