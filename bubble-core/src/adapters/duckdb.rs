//! DuckDB transaction store

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use duckdb::{params, Connection};
use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::{Identity, RawRow, Split, Transaction};
use crate::ports::TransactionStore;
use crate::services::{MigrationReport, Migrator};

const SELECT_COLUMNS: &str = "SELECT transaction_id, transaction_date, description, amount,
        currency, counterparty, movement_id, category, subcategory, is_refund,
        refund_category, refund_subcategory, splits, raw
    FROM sys_transactions";

const UPSERT_SQL: &str = "INSERT INTO sys_transactions (
        transaction_id, transaction_date, description, amount,
        currency, counterparty, movement_id, category, subcategory, is_refund,
        refund_category, refund_subcategory, splits, raw, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
    ON CONFLICT (transaction_id) DO UPDATE SET
        transaction_date = EXCLUDED.transaction_date,
        description = EXCLUDED.description,
        amount = EXCLUDED.amount,
        currency = EXCLUDED.currency,
        counterparty = EXCLUDED.counterparty,
        movement_id = EXCLUDED.movement_id,
        category = EXCLUDED.category,
        subcategory = EXCLUDED.subcategory,
        is_refund = EXCLUDED.is_refund,
        refund_category = EXCLUDED.refund_category,
        refund_subcategory = EXCLUDED.refund_subcategory,
        splits = EXCLUDED.splits,
        raw = EXCLUDED.raw,
        updated_at = EXCLUDED.updated_at";

/// Row as read from sys_transactions, before decoding the text columns
struct StoredRow {
    id: String,
    date: String,
    description: String,
    amount: String,
    currency: Option<String>,
    counterparty: Option<String>,
    movement_id: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
    is_refund: bool,
    refund_category: Option<String>,
    refund_subcategory: Option<String>,
    splits: String,
    raw: String,
}

impl StoredRow {
    fn read(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            date: row.get(1)?,
            description: row.get(2)?,
            amount: row.get(3)?,
            currency: row.get(4)?,
            counterparty: row.get(5)?,
            movement_id: row.get(6)?,
            category: row.get(7)?,
            subcategory: row.get(8)?,
            is_refund: row.get(9)?,
            refund_category: row.get(10)?,
            refund_subcategory: row.get(11)?,
            splits: row.get(12)?,
            raw: row.get(13)?,
        })
    }

    fn into_transaction(self) -> Result<Transaction> {
        let amount: Decimal = self.amount.parse().map_err(|e| {
            Error::database(format!("Invalid amount for {}: {} ({})", self.id, self.amount, e))
        })?;
        let splits: Vec<Split> = serde_json::from_str(&self.splits)?;
        let raw: RawRow = serde_json::from_str(&self.raw)?;

        Ok(Transaction {
            id: Identity::new(self.id),
            date: self.date,
            description: self.description,
            amount,
            currency: self.currency,
            counterparty: self.counterparty,
            movement_id: self.movement_id,
            category: self.category,
            subcategory: self.subcategory,
            is_refund: self.is_refund,
            refund_category: self.refund_category,
            refund_subcategory: self.refund_subcategory,
            splits,
            raw,
        })
    }
}

/// DuckDB-backed [`TransactionStore`]
pub struct DuckDbStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbStore {
    /// Open (or create) a database file
    ///
    /// Bubble expects to be the only process using the file; DuckDB refuses a
    /// second writer and that error is returned as is.
    pub fn open(db_path: &Path) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Self::connect(db_path)?),
            db_path: Some(db_path.to_path_buf()),
        })
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory_with_flags(config)?),
            db_path: None,
        })
    }

    fn connect(db_path: &Path) -> Result<Connection> {
        // No extension autoloading: JSON is linked statically via the "json" feature
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Run pending migrations, returning what was applied
    pub fn run_migrations(&self) -> Result<MigrationReport> {
        let conn = self.lock()?;
        Migrator::store(&conn)
            .run_pending()
            .map_err(|e| Error::database(format!("{:#}", e)))
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    /// Path of the database file (`None` for in-memory stores)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Size of the database file in bytes
    pub fn db_size(&self) -> Result<u64> {
        match &self.db_path {
            Some(path) => Ok(std::fs::metadata(path)?.len()),
            None => Ok(0),
        }
    }

    // === Transaction operations ===

    pub fn get_transactions_by_ids(&self, ids: &[Identity]) -> Result<Vec<Option<Transaction>>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{} WHERE transaction_id = ?", SELECT_COLUMNS))?;

        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            let row = stmt
                .query_map([id.as_str()], StoredRow::read)?
                .next()
                .transpose()?;
            found.push(row.map(StoredRow::into_transaction).transpose()?);
        }
        Ok(found)
    }

    pub fn get_transactions(&self) -> Result<Vec<Transaction>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY transaction_date DESC, transaction_id ASC",
            SELECT_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], StoredRow::read)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        rows.into_iter().map(StoredRow::into_transaction).collect()
    }

    pub fn get_transaction_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM sys_transactions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Upsert a batch inside one database transaction
    ///
    /// When the same id appears twice in a batch the later record wins.
    pub fn upsert_transactions(&self, txs: &[Transaction]) -> Result<()> {
        if txs.is_empty() {
            return Ok(());
        }

        let mut last_by_id: HashMap<&Identity, usize> = HashMap::new();
        for (i, tx) in txs.iter().enumerate() {
            last_by_id.insert(&tx.id, i);
        }

        let mut conn = self.lock()?;
        let db_tx = conn.transaction()?;
        {
            let mut stmt = db_tx.prepare(UPSERT_SQL)?;
            for (i, tx) in txs.iter().enumerate() {
                if last_by_id.get(&tx.id) != Some(&i) {
                    continue;
                }
                let splits = serde_json::to_string(&tx.splits)?;
                let raw = serde_json::to_string(&tx.raw)?;
                stmt.execute(params![
                    tx.id.as_str(),
                    tx.date,
                    tx.description,
                    tx.amount.to_string(),
                    tx.currency,
                    tx.counterparty,
                    tx.movement_id,
                    tx.category,
                    tx.subcategory,
                    tx.is_refund,
                    tx.refund_category,
                    tx.refund_subcategory,
                    splits,
                    raw,
                ])?;
            }
        }
        db_tx.commit()?;
        Ok(())
    }

    pub fn delete_transactions(&self, ids: &[Identity]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let db_tx = conn.transaction()?;
        {
            let mut stmt = db_tx.prepare("DELETE FROM sys_transactions WHERE transaction_id = ?")?;
            for id in ids {
                stmt.execute([id.as_str()])?;
            }
        }
        db_tx.commit()?;
        Ok(())
    }

    pub fn clear_transactions(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM sys_transactions", [])?;
        Ok(())
    }

    /// Check if a table exists in the main schema
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables
             WHERE table_schema = 'main' AND table_name = ?",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[async_trait]
impl TransactionStore for DuckDbStore {
    async fn get_many(&self, ids: &[Identity]) -> Result<Vec<Option<Transaction>>> {
        self.get_transactions_by_ids(ids)
    }

    async fn upsert_many(&self, txs: &[Transaction]) -> Result<()> {
        self.upsert_transactions(txs)
    }

    async fn get_all(&self) -> Result<Vec<Transaction>> {
        self.get_transactions()
    }

    async fn delete_many(&self, ids: &[Identity]) -> Result<()> {
        self.delete_transactions(ids)
    }

    async fn clear(&self) -> Result<()> {
        self.clear_transactions()
    }

    async fn count(&self) -> Result<usize> {
        self.get_transaction_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DuckDbStore {
        let store = DuckDbStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store
    }

    fn tx(id: &str, date: &str, amount: &str) -> Transaction {
        Transaction::new(Identity::new(id), date, "Coffee", amount.parse().unwrap())
    }

    #[test]
    fn test_schema_created() {
        let store = store();
        assert!(store.table_exists("sys_transactions").unwrap());
        assert!(store.table_exists("sys_migrations").unwrap());
    }

    #[test]
    fn test_amount_round_trips_exactly() {
        let store = store();
        store.upsert_transactions(&[tx("a", "2024-01-01", "-1234.5678")]).unwrap();

        let found = store.get_transactions_by_ids(&[Identity::new("a")]).unwrap();
        assert_eq!(found[0].as_ref().unwrap().amount.to_string(), "-1234.5678");
    }

    #[test]
    fn test_get_many_is_positional() {
        let store = store();
        store
            .upsert_transactions(&[tx("a", "2024-01-01", "-1"), tx("b", "2024-01-02", "-2")])
            .unwrap();

        let found = store
            .get_transactions_by_ids(&[Identity::new("b"), Identity::new("zzz"), Identity::new("a")])
            .unwrap();
        assert_eq!(found[0].as_ref().unwrap().id.as_str(), "b");
        assert!(found[1].is_none());
        assert_eq!(found[2].as_ref().unwrap().id.as_str(), "a");
    }

    #[test]
    fn test_get_all_order() {
        let store = store();
        store
            .upsert_transactions(&[
                tx("b", "2024-01-01", "-1"),
                tx("a", "2024-01-01", "-1"),
                tx("c", "2024-03-01", "-1"),
            ])
            .unwrap();

        let ids: Vec<_> = store
            .get_transactions()
            .unwrap()
            .into_iter()
            .map(|t| t.id.to_string())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_duplicate_ids_in_batch_last_wins() {
        let store = store();
        let mut second = tx("a", "2024-01-01", "-1");
        second.category = Some("Event".to_string());
        store
            .upsert_transactions(&[tx("a", "2024-01-01", "-1"), second])
            .unwrap();

        let all = store.get_transactions().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].category(), Some("Event"));
    }

    #[test]
    fn test_delete_and_clear() {
        let store = store();
        store
            .upsert_transactions(&[tx("a", "2024-01-01", "-1"), tx("b", "2024-01-02", "-2")])
            .unwrap();

        store
            .delete_transactions(&[Identity::new("a"), Identity::new("missing")])
            .unwrap();
        assert_eq!(store.get_transaction_count().unwrap(), 1);

        store.clear_transactions().unwrap();
        assert_eq!(store.get_transaction_count().unwrap(), 0);
    }
}
