//! Status service - store summary

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::domain::{Classification, Transaction};
use crate::ports::TransactionStore;

use super::aggregate::{summary, Summary};
use super::period::available_years;

/// Status service for store summaries
pub struct StatusService {
    store: Arc<dyn TransactionStore>,
}

impl StatusService {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// Get overall status summary
    pub async fn get_status(&self) -> Result<StatusSummary> {
        let txs = self.store.get_all().await?;
        Ok(StatusSummary::of(&txs))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSummary {
    pub total_transactions: usize,
    pub categorized: usize,
    pub uncategorized: usize,
    pub split_transactions: usize,
    pub refunds: usize,
    pub manual_transactions: usize,
    pub totals: Summary,
    pub date_range: DateRange,
    /// Years with data, most recent first
    pub years: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateRange {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}

impl StatusSummary {
    pub fn of(txs: &[Transaction]) -> Self {
        let mut status = StatusSummary {
            total_transactions: txs.len(),
            totals: summary(txs),
            ..Default::default()
        };

        for tx in txs {
            match tx.classification() {
                Classification::Unclassified => status.uncategorized += 1,
                Classification::Split { .. } => {
                    status.categorized += 1;
                    status.split_transactions += 1;
                }
                Classification::Refund { .. } => {
                    status.categorized += 1;
                    status.refunds += 1;
                }
                _ => status.categorized += 1,
            }
            if tx.id.as_str().starts_with("manual_") {
                status.manual_transactions += 1;
            }
        }

        let dates = txs.iter().map(|t| t.date.as_str()).filter(|d| !d.is_empty());
        status.date_range = DateRange {
            earliest: dates.clone().min().map(str::to_string),
            latest: dates.max().map(str::to_string),
        };
        status.years = available_years(txs);
        status
    }
}
