//! Transaction store port - keyed record store abstraction

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::{Identity, Transaction};

/// Keyed record store for transactions
///
/// Implementations (adapters) provide the actual storage. Upserts overwrite
/// by `id`; bulk calls either apply completely or leave the store untouched.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Look up many ids at once; the answer is positional, `None` for unknown ids
    async fn get_many(&self, ids: &[Identity]) -> Result<Vec<Option<Transaction>>>;

    /// Insert or overwrite transactions by id
    async fn upsert_many(&self, txs: &[Transaction]) -> Result<()>;

    /// All transactions, date descending then id ascending
    async fn get_all(&self) -> Result<Vec<Transaction>>;

    /// Delete by id; unknown ids are ignored
    async fn delete_many(&self, ids: &[Identity]) -> Result<()>;

    /// Remove every transaction
    async fn clear(&self) -> Result<()>;

    /// Look up a single transaction
    async fn get(&self, id: &Identity) -> Result<Option<Transaction>> {
        let mut found = self.get_many(std::slice::from_ref(id)).await?;
        Ok(found.pop().flatten())
    }

    /// Number of stored transactions
    async fn count(&self) -> Result<usize> {
        Ok(self.get_all().await?.len())
    }
}
