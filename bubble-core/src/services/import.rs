//! Import service - CSV statement import
//!
//! `preview` reads and normalizes without touching the store. `commit` refuses an
//! incomplete mapping, carries prior categorization forward, upserts, and runs the
//! dedupe pass over the whole store.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::result::Error;
use crate::domain::{Identity, Transaction};
use crate::ports::TransactionStore;

use super::csv_io::{read_csv_file, CsvTable};
use super::dedupe::{DedupeResult, Deduplicator};
use super::mapping::{infer_mapping, ColumnMapping};
use super::merge::merge_with_previous;
use super::normalize::{normalize_batch, NormalizeReport};

/// What an import would do, computed without writing
#[derive(Debug, Clone, Serialize)]
pub struct ImportPreview {
    pub headers: Vec<String>,
    pub mapping: ColumnMapping,
    /// Required fields still unmapped
    pub missing: Vec<&'static str>,
    pub row_count: usize,
    pub transactions: Vec<Transaction>,
    pub zero_dropped: usize,
    pub date_fallbacks: usize,
    pub amount_fallbacks: usize,
}

/// Outcome of a committed import
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResult {
    /// Transactions written (new and re-imported)
    pub imported: usize,
    /// Of those, how many were already stored
    pub matched_previous: usize,
    pub zero_dropped: usize,
    pub date_fallbacks: usize,
    pub amount_fallbacks: usize,
    pub dedupe: DedupeResult,
}

/// Import service for CSV statements
pub struct ImportService {
    store: Arc<dyn TransactionStore>,
}

impl ImportService {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// Read a statement file and guess its column mapping
    pub fn read(&self, path: &Path) -> Result<(CsvTable, ColumnMapping)> {
        let table = read_csv_file(path)
            .with_context(|| format!("Failed to read CSV file {}", path.display()))?;
        let mapping = infer_mapping(&table.headers);
        Ok((table, mapping))
    }

    /// Normalize a table with the given mapping, without writing
    pub fn preview(&self, table: &CsvTable, mapping: &ColumnMapping) -> ImportPreview {
        let missing = mapping.missing_required();
        let report = if missing.is_empty() {
            normalize_batch(&table.rows, mapping)
        } else {
            NormalizeReport::default()
        };

        ImportPreview {
            headers: table.headers.clone(),
            mapping: mapping.clone(),
            missing,
            row_count: table.rows.len(),
            transactions: report.transactions,
            zero_dropped: report.zero_dropped,
            date_fallbacks: report.date_fallbacks,
            amount_fallbacks: report.amount_fallbacks,
        }
    }

    /// Normalize, merge with stored records, write, then deduplicate
    pub async fn commit(&self, table: &CsvTable, mapping: &ColumnMapping) -> Result<ImportResult> {
        let missing = mapping.missing_required();
        if !missing.is_empty() {
            return Err(Error::validation(format!(
                "Column mapping incomplete, missing: {}",
                missing.join(", ")
            ))
            .into());
        }

        let report = normalize_batch(&table.rows, mapping);
        let mut incoming = report.transactions;

        let ids: Vec<Identity> = incoming.iter().map(|t| t.id.clone()).collect();
        let previous = self
            .store
            .get_many(&ids)
            .await
            .context("Failed to look up previously imported transactions")?;
        let matched_previous = merge_with_previous(&mut incoming, &previous);

        self.store
            .upsert_many(&incoming)
            .await
            .context("Failed to save imported transactions")?;

        let dedupe = Deduplicator::new(Arc::clone(&self.store)).run().await?;

        let result = ImportResult {
            imported: incoming.len(),
            matched_previous,
            zero_dropped: report.zero_dropped,
            date_fallbacks: report.date_fallbacks,
            amount_fallbacks: report.amount_fallbacks,
            dedupe,
        };
        tracing::info!(
            imported = result.imported,
            matched = result.matched_previous,
            zero_dropped = result.zero_dropped,
            "imported transactions"
        );
        Ok(result)
    }

    /// Read, map (with the caller's corrections already applied) and commit a file
    pub async fn import_file(
        &self,
        path: &Path,
        adjust: impl FnOnce(ColumnMapping) -> ColumnMapping,
    ) -> Result<ImportResult> {
        let (table, mapping) = self.read(path)?;
        self.commit(&table, &adjust(mapping)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::services::csv_io::read_csv;
    use crate::services::mapping::ColumnField;

    const STATEMENT: &str = "Date;Libellés;Montant;Numéro de mouvement\n\
        05/08/2024;Coffee;-4,50;MV-1\n\
        06/08/2024;Salary;2.500,00;MV-2\n\
        07/08/2024;Nothing;0,00;MV-3\n";

    fn service() -> (Arc<MemoryStore>, ImportService) {
        let store = Arc::new(MemoryStore::new());
        let service = ImportService::new(store.clone());
        (store, service)
    }

    #[test]
    fn test_preview_does_not_write() {
        let (_, service) = service();
        let table = read_csv(STATEMENT).unwrap();
        let mapping = infer_mapping(&table.headers);
        let preview = service.preview(&table, &mapping);
        assert!(preview.missing.is_empty());
        assert_eq!(preview.row_count, 3);
        assert_eq!(preview.transactions.len(), 2);
        assert_eq!(preview.zero_dropped, 1);
    }

    #[tokio::test]
    async fn test_commit_rejects_incomplete_mapping() {
        let (store, service) = service();
        let table = read_csv(STATEMENT).unwrap();
        let mapping = infer_mapping(&table.headers).with_overrides([(ColumnField::Amount, "")]);

        let err = service.commit(&table, &mapping).await.unwrap_err();
        assert!(err.to_string().contains("amount"));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reimport_keeps_categorization() {
        let (store, service) = service();
        let table = read_csv(STATEMENT).unwrap();
        let mapping = infer_mapping(&table.headers);

        let first = service.commit(&table, &mapping).await.unwrap();
        assert_eq!(first.imported, 2);
        assert_eq!(first.matched_previous, 0);

        let mut coffee = store.get(&Identity::new("MV-1")).await.unwrap().unwrap();
        coffee.category = Some("Event".into());
        store.upsert_many(&[coffee]).await.unwrap();

        let second = service.commit(&table, &mapping).await.unwrap();
        assert_eq!(second.matched_previous, 2);
        assert_eq!(store.count().await.unwrap(), 2);
        let coffee = store.get(&Identity::new("MV-1")).await.unwrap().unwrap();
        assert_eq!(coffee.category.as_deref(), Some("Event"));
    }
}
