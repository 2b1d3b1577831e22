//! In-memory transaction store
//!
//! Thread-safe [`TransactionStore`] with no I/O, used by unit tests and by
//! callers that only need a scratch workspace (e.g. import previews).

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::result::{Error, Result};
use crate::domain::{Identity, Transaction};
use crate::ports::TransactionStore;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<Identity, Transaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with transactions (later duplicates win)
    pub fn with_transactions(txs: impl IntoIterator<Item = Transaction>) -> Self {
        let records = txs.into_iter().map(|tx| (tx.id.clone(), tx)).collect();
        Self {
            records: Mutex::new(records),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<Identity, Transaction>>> {
        self.records
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn get_many(&self, ids: &[Identity]) -> Result<Vec<Option<Transaction>>> {
        let records = self.lock()?;
        Ok(ids.iter().map(|id| records.get(id).cloned()).collect())
    }

    async fn upsert_many(&self, txs: &[Transaction]) -> Result<()> {
        let mut records = self.lock()?;
        for tx in txs {
            records.insert(tx.id.clone(), tx.clone());
        }
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Transaction>> {
        let records = self.lock()?;
        let mut all: Vec<Transaction> = records.values().cloned().collect();
        // BTreeMap yields id order; a stable sort keeps it within a date
        all.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(all)
    }

    async fn delete_many(&self, ids: &[Identity]) -> Result<()> {
        let mut records = self.lock()?;
        for id in ids {
            records.remove(id);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str, date: &str) -> Transaction {
        Transaction::new(Identity::new(id), date, "Coffee", "-4.5".parse().unwrap())
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let store = MemoryStore::new();
        store.upsert_many(&[tx("a", "2024-01-01")]).await.unwrap();

        let mut changed = tx("a", "2024-01-01");
        changed.description = "Tea".to_string();
        store.upsert_many(&[changed]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let found = store.get(&Identity::new("a")).await.unwrap().unwrap();
        assert_eq!(found.description, "Tea");
    }

    #[tokio::test]
    async fn test_get_all_date_desc_then_id() {
        let store = MemoryStore::with_transactions(vec![
            tx("b", "2024-01-01"),
            tx("a", "2024-01-01"),
            tx("c", "2024-02-01"),
        ]);
        let ids: Vec<_> = store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id.to_string())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_delete_ignores_unknown_ids() {
        let store = MemoryStore::with_transactions(vec![tx("a", "2024-01-01")]);
        store
            .delete_many(&[Identity::new("a"), Identity::new("zzz")])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
