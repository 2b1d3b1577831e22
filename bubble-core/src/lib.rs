//! Bubble Core - bank statement import, categorization and budget recaps
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (Transaction, Split, CategoryTaxonomy, etc.)
//! - **ports**: Trait definitions for external dependencies (TransactionStore)
//! - **services**: Business logic orchestration (import, dedupe, aggregation, ...)
//! - **adapters**: Concrete implementations (DuckDB, in-memory)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::DuckDbStore;
use config::Config;
use ports::TransactionStore;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{
    CategoryTaxonomy, Classification, ClassificationEdit, Identity, ReportLayout, Split,
    Transaction,
};
pub use services::{EntryPoint, LogEvent, LoggingService};

/// Database file inside the data directory
pub const DB_FILENAME: &str = "bubble.duckdb";

/// Main context for Bubble operations
///
/// This is the primary entry point for all business logic. It holds
/// the store, configuration, and all services.
pub struct BubbleContext {
    pub config: Config,
    pub store: Arc<DuckDbStore>,
    pub import_service: ImportService,
    pub categorize_service: CategorizeService,
    pub deduplicator: Deduplicator,
    pub status_service: StatusService,
    pub doctor_service: DoctorService,
}

impl BubbleContext {
    /// Open the data directory, creating the database on first use
    pub fn new(bubble_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(bubble_dir)
            .with_context(|| format!("Failed to create {}", bubble_dir.display()))?;
        let config = Config::load_or_init(bubble_dir)?;

        let db_path = bubble_dir.join(DB_FILENAME);
        let store = Arc::new(DuckDbStore::open(&db_path)?);

        // Initialize schema
        store.ensure_schema()?;

        let port: Arc<dyn TransactionStore> = store.clone();
        Ok(Self {
            import_service: ImportService::new(Arc::clone(&port)),
            categorize_service: CategorizeService::new(Arc::clone(&port), config.taxonomy.clone()),
            deduplicator: Deduplicator::new(Arc::clone(&port)),
            status_service: StatusService::new(Arc::clone(&port)),
            doctor_service: DoctorService::new(port),
            config,
            store,
        })
    }

    /// All transactions inside a period
    pub async fn transactions(&self, period: &Period) -> Result<Vec<Transaction>> {
        let all = self.store.get_all().await?;
        Ok(period.filter(&all))
    }

    /// Recap view over a period
    pub async fn recap(&self, period: &Period) -> Result<Recap> {
        let txs = self.transactions(period).await?;
        Ok(recap(&txs, &self.config.taxonomy, &self.config.report))
    }

    /// Budget overview over a period
    pub async fn overview(&self, period: &Period) -> Result<Overview> {
        let txs = self.transactions(period).await?;
        Ok(overview(&txs, &self.config.taxonomy, &self.config.report))
    }

    /// Remove every stored transaction
    pub async fn reset(&self) -> Result<usize> {
        let count = self.store.count().await?;
        self.store.clear().await.context("Failed to clear transactions")?;
        tracing::info!(removed = count, "cleared transaction store");
        Ok(count)
    }
}
