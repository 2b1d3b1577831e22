//! Doctor service - data health checks
//!
//! Reports stored records that break the categorization invariants. Nothing is
//! repaired here; aggregation tolerates all of these.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::domain::{display_amount, Transaction, SPLIT_SUM_TOLERANCE};
use crate::ports::TransactionStore;

use super::dedupe::plan_dedupe;
use super::normalize::ZERO_AMOUNT_EPSILON;

/// Doctor service for health checks
pub struct DoctorService {
    store: Arc<dyn TransactionStore>,
}

impl DoctorService {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// Run all health checks against the store
    pub async fn run_checks(&self) -> Result<DoctorResult> {
        let txs = self.store.get_all().await?;
        Ok(check_transactions(&txs))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warning,
    Error,
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: BTreeMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: usize,
    pub warnings: usize,
    pub errors: usize,
}

fn check(
    failing: Vec<serde_json::Value>,
    severity: CheckStatus,
    ok: &str,
    problem: impl FnOnce(usize) -> String,
) -> CheckResult {
    if failing.is_empty() {
        CheckResult {
            status: CheckStatus::Pass,
            message: ok.to_string(),
            details: None,
        }
    } else {
        CheckResult {
            status: severity,
            message: problem(failing.len()),
            details: Some(failing),
        }
    }
}

fn is_iso_date(date: &str) -> bool {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
}

/// Run every check over an in-memory list
pub fn check_transactions(txs: &[Transaction]) -> DoctorResult {
    let mut checks = BTreeMap::new();

    let split_mismatch: Vec<_> = txs
        .iter()
        .filter(|t| t.has_splits())
        .filter_map(|t| {
            let sum: Decimal = t.splits.iter().map(|s| s.amount).sum();
            ((sum - t.amount.abs()).abs() >= SPLIT_SUM_TOLERANCE).then(|| {
                json!({
                    "transaction_id": t.id,
                    "amount": display_amount(t.amount),
                    "split_total": display_amount(sum),
                })
            })
        })
        .collect();
    checks.insert(
        "split_sum_mismatch".to_string(),
        check(split_mismatch, CheckStatus::Error, "All splits add up", |n| {
            format!("{} split transaction(s) do not add up to their amount", n)
        }),
    );

    let split_with_category: Vec<_> = txs
        .iter()
        .filter(|t| t.has_splits() && (t.category().is_some() || t.subcategory().is_some()))
        .map(|t| json!({ "transaction_id": t.id, "category": t.category }))
        .collect();
    checks.insert(
        "split_with_category".to_string(),
        check(
            split_with_category,
            CheckStatus::Warning,
            "No split transaction carries a category",
            |n| format!("{} split transaction(s) still carry a top-level category", n),
        ),
    );

    let stray_refund_fields: Vec<_> = txs
        .iter()
        .filter(|t| {
            let refund = t.is_refund && t.is_inflow();
            !refund && (t.refund_category().is_some() || t.refund_subcategory().is_some())
        })
        .map(|t| json!({ "transaction_id": t.id }))
        .collect();
    checks.insert(
        "refund_fields_on_non_refund".to_string(),
        check(
            stray_refund_fields,
            CheckStatus::Warning,
            "Refund fields only appear on refunds",
            |n| format!("{} non-refund transaction(s) carry refund fields", n),
        ),
    );

    let bad_dates: Vec<_> = txs
        .iter()
        .filter(|t| !is_iso_date(&t.date))
        .map(|t| json!({ "transaction_id": t.id, "date": t.date }))
        .collect();
    checks.insert(
        "date_format".to_string(),
        check(bad_dates, CheckStatus::Error, "All dates are ISO dates", |n| {
            format!("{} transaction(s) have an unrecognized date", n)
        }),
    );

    let zero_amounts: Vec<_> = txs
        .iter()
        .filter(|t| t.amount.abs() <= ZERO_AMOUNT_EPSILON)
        .map(|t| json!({ "transaction_id": t.id }))
        .collect();
    checks.insert(
        "zero_amounts".to_string(),
        check(zero_amounts, CheckStatus::Warning, "No zero-amount transactions", |n| {
            format!("{} transaction(s) have a zero amount", n)
        }),
    );

    let plan = plan_dedupe(txs);
    let duplicates: Vec<_> = plan
        .deletions
        .iter()
        .map(|id| json!({ "transaction_id": id }))
        .collect();
    checks.insert(
        "pending_duplicates".to_string(),
        check(duplicates, CheckStatus::Warning, "No duplicates pending", |n| {
            format!("{} duplicate transaction(s) would be removed by dedupe", n)
        }),
    );

    let count = |status: CheckStatus| checks.values().filter(|c: &&CheckResult| c.status == status).count();
    let summary = DoctorSummary {
        passed: count(CheckStatus::Pass),
        warnings: count(CheckStatus::Warning),
        errors: count(CheckStatus::Error),
    };

    DoctorResult { checks, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::domain::{Identity, Split};

    fn tx(id: &str, amount: i64) -> Transaction {
        Transaction::new(Identity::new(id), "2024-08-05", id, Decimal::new(amount, 0))
    }

    #[tokio::test]
    async fn test_clean_store_passes() {
        let store = Arc::new(MemoryStore::with_transactions(vec![tx("a", -5), tx("b", 10)]));
        let result = DoctorService::new(store).run_checks().await.unwrap();
        assert_eq!(result.summary.warnings, 0);
        assert_eq!(result.summary.errors, 0);
        assert_eq!(result.summary.passed, result.checks.len());
    }

    #[test]
    fn test_reports_problems() {
        let mut split = tx("split", -100);
        split.category = Some("Event".into());
        split.splits = vec![Split::new(Decimal::new(90, 0), "Local", None)];

        let mut stray = tx("stray", -5);
        stray.refund_category = Some("Event".into());

        let mut bad_date = tx("date", -7);
        bad_date.date = "yesterday".into();

        let dup_a = tx("dup", -3);
        let mut dup_b = tx("dup-2", -3);
        dup_b.description = "DUP".into();

        let result = check_transactions(&[split, stray, bad_date, tx("zero", 0), dup_a, dup_b]);
        let status = |name: &str| result.checks[name].status;

        assert_eq!(status("split_sum_mismatch"), CheckStatus::Error);
        assert_eq!(status("split_with_category"), CheckStatus::Warning);
        assert_eq!(status("refund_fields_on_non_refund"), CheckStatus::Warning);
        assert_eq!(status("date_format"), CheckStatus::Error);
        assert_eq!(status("zero_amounts"), CheckStatus::Warning);
        assert_eq!(status("pending_duplicates"), CheckStatus::Warning);
        assert_eq!(result.summary.passed, 0);
    }
}
