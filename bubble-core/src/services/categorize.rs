//! Categorize service - editing categorization and manual entry
//!
//! Every edit loads the stored record, applies a validated
//! [`ClassificationEdit`] and writes it back. Nothing is written when the
//! edit is rejected.

use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use chrono::Local;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::result::Error;
use crate::domain::{CategoryTaxonomy, ClassificationEdit, Identity, Split, Transaction};
use crate::ports::TransactionStore;

use super::locale::{parse_amount, parse_date};

fn money_format() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+([.,]\d{1,2})?$").expect("valid regex"))
}

/// Kind of a manually entered transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Expense,
    Income,
    Refund,
}

/// A transaction typed in by hand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualEntry {
    pub kind: EntryKind,
    /// Defaults to today
    #[serde(default)]
    pub date: Option<String>,
    pub description: String,
    /// As typed, e.g. `100,00`; the sign comes from `kind`
    pub amount: String,
    /// Expense or income category, or the refunded category
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
}

impl ManualEntry {
    /// Build the transaction, checking the entry against the taxonomy
    pub fn into_transaction(self, taxonomy: &CategoryTaxonomy) -> crate::domain::result::Result<Transaction> {
        let description = self.description.trim();
        if description.is_empty() {
            return Err(Error::validation("Description is required"));
        }

        let amount_text = self.amount.trim();
        if !money_format().is_match(amount_text) {
            return Err(Error::validation(format!("Invalid amount: {}", amount_text)));
        }
        let value = parse_amount(Some(amount_text)).value.abs();
        if value <= Decimal::ZERO {
            return Err(Error::validation("Amount must be greater than zero"));
        }

        let date = match self.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(d) => {
                let parsed = parse_date(Some(d));
                if parsed.fallback {
                    return Err(Error::validation(format!("Invalid date: {}", d)));
                }
                parsed.value
            }
            None => Local::now().date_naive().format("%Y-%m-%d").to_string(),
        };

        let category = self.category.filter(|c| !c.trim().is_empty());
        let subcategory = self.subcategory.filter(|s| !s.trim().is_empty());

        let signed = if self.kind == EntryKind::Expense { -value } else { value };
        let mut tx = Transaction::new(Identity::manual(), date, description, signed);

        match self.kind {
            EntryKind::Expense => {
                let category =
                    category.ok_or_else(|| Error::validation("Expense category is required"))?;
                if taxonomy.declares_subcategories(&category) && subcategory.is_none() {
                    return Err(Error::validation(format!(
                        "A subcategory is required for {}",
                        category
                    )));
                }
                tx.apply(ClassificationEdit::ExpenseCategory(category), taxonomy)?;
                tx.apply(ClassificationEdit::ExpenseSubcategory(subcategory), taxonomy)?;
            }
            EntryKind::Income => {
                let category =
                    category.ok_or_else(|| Error::validation("Income category is required"))?;
                tx.apply(ClassificationEdit::IncomeCategory(category), taxonomy)?;
            }
            EntryKind::Refund => {
                let category =
                    category.ok_or_else(|| Error::validation("Refunded category is required"))?;
                if taxonomy.declares_subcategories(&category) && subcategory.is_none() {
                    return Err(Error::validation(format!(
                        "A refunded subcategory is required for {}",
                        category
                    )));
                }
                tx.apply(ClassificationEdit::Refund(true), taxonomy)?;
                tx.apply(ClassificationEdit::RefundCategory(category), taxonomy)?;
                tx.apply(ClassificationEdit::RefundSubcategory(subcategory), taxonomy)?;
            }
        }

        Ok(tx)
    }
}

/// Categorization editing over the store
pub struct CategorizeService {
    store: Arc<dyn TransactionStore>,
    taxonomy: CategoryTaxonomy,
}

impl CategorizeService {
    pub fn new(store: Arc<dyn TransactionStore>, taxonomy: CategoryTaxonomy) -> Self {
        Self { store, taxonomy }
    }

    pub fn taxonomy(&self) -> &CategoryTaxonomy {
        &self.taxonomy
    }

    /// Load one transaction, failing when the id is unknown
    pub async fn get(&self, id: &Identity) -> Result<Transaction> {
        let tx = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Transaction not found: {}", id)))?;
        Ok(tx)
    }

    async fn edit(&self, id: &Identity, edit: ClassificationEdit) -> Result<Transaction> {
        let mut tx = self.get(id).await?;

        tx.apply(edit, &self.taxonomy)?;
        self.store
            .upsert_many(std::slice::from_ref(&tx))
            .await
            .with_context(|| format!("Failed to save transaction {}", id))?;
        Ok(tx)
    }

    /// Set the expense category; `""` clears it. The subcategory is reset.
    pub async fn set_expense_category(&self, id: &Identity, category: &str) -> Result<Transaction> {
        self.edit(id, ClassificationEdit::ExpenseCategory(category.to_string()))
            .await
    }

    pub async fn set_expense_subcategory(
        &self,
        id: &Identity,
        subcategory: Option<&str>,
    ) -> Result<Transaction> {
        self.edit(
            id,
            ClassificationEdit::ExpenseSubcategory(subcategory.map(str::to_string)),
        )
        .await
    }

    pub async fn set_income_category(&self, id: &Identity, category: &str) -> Result<Transaction> {
        self.edit(id, ClassificationEdit::IncomeCategory(category.to_string()))
            .await
    }

    /// Mark or unmark an inflow as a refund
    pub async fn set_refund(&self, id: &Identity, is_refund: bool) -> Result<Transaction> {
        self.edit(id, ClassificationEdit::Refund(is_refund)).await
    }

    pub async fn set_refund_category(&self, id: &Identity, category: &str) -> Result<Transaction> {
        self.edit(id, ClassificationEdit::RefundCategory(category.to_string()))
            .await
    }

    pub async fn set_refund_subcategory(
        &self,
        id: &Identity,
        subcategory: Option<&str>,
    ) -> Result<Transaction> {
        self.edit(
            id,
            ClassificationEdit::RefundSubcategory(subcategory.map(str::to_string)),
        )
        .await
    }

    /// Replace the split allocation of an outflow
    pub async fn set_splits(&self, id: &Identity, splits: Vec<Split>) -> Result<Transaction> {
        self.edit(id, ClassificationEdit::Splits(splits)).await
    }

    pub async fn clear_splits(&self, id: &Identity) -> Result<Transaction> {
        self.edit(id, ClassificationEdit::ClearSplits).await
    }

    /// Remove every categorization field
    pub async fn clear(&self, id: &Identity) -> Result<Transaction> {
        self.edit(id, ClassificationEdit::Clear).await
    }

    /// Validate and store a manual entry
    pub async fn add_manual(&self, entry: ManualEntry) -> Result<Transaction> {
        let tx = entry.into_transaction(&self.taxonomy)?;
        self.store
            .upsert_many(std::slice::from_ref(&tx))
            .await
            .context("Failed to save manual transaction")?;
        tracing::info!("added manual transaction");
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn service_with(txs: Vec<Transaction>) -> (Arc<MemoryStore>, CategorizeService) {
        let store = Arc::new(MemoryStore::with_transactions(txs));
        let service = CategorizeService::new(store.clone(), CategoryTaxonomy::default());
        (store, service)
    }

    fn entry(kind: EntryKind, amount: &str, category: Option<&str>, sub: Option<&str>) -> ManualEntry {
        ManualEntry {
            kind,
            date: Some("05/08/2024".to_string()),
            description: " Lunch ".to_string(),
            amount: amount.to_string(),
            category: category.map(str::to_string),
            subcategory: sub.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_set_category_persists() {
        let id = Identity::new("a");
        let tx = Transaction::new(id.clone(), "2024-08-05", "Coffee", dec("-4.5"));
        let (store, service) = service_with(vec![tx]);

        service.set_expense_category(&id, "Event").await.unwrap();
        let updated = service
            .set_expense_subcategory(&id, Some("Catering"))
            .await
            .unwrap();
        assert_eq!(updated.subcategory.as_deref(), Some("Catering"));

        let stored = store.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.category.as_deref(), Some("Event"));
        assert_eq!(stored.subcategory.as_deref(), Some("Catering"));

        // changing the category resets the subcategory
        let updated = service.set_expense_category(&id, "Local").await.unwrap();
        assert!(updated.subcategory.is_none());
    }

    #[tokio::test]
    async fn test_rejected_edit_is_not_written() {
        let id = Identity::new("a");
        let tx = Transaction::new(id.clone(), "2024-08-05", "Dinner", dec("-100"));
        let (store, service) = service_with(vec![tx.clone()]);

        let result = service
            .set_splits(&id, vec![Split::new(dec("90"), "Event", None)])
            .await;
        assert!(result.is_err());
        assert_eq!(store.get(&id).await.unwrap().unwrap(), tx);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let (_, service) = service_with(vec![]);
        let err = service
            .set_refund(&Identity::new("missing"), true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn test_add_manual_expense() {
        let (store, service) = service_with(vec![]);
        let tx = service
            .add_manual(entry(EntryKind::Expense, "12,50", Some("Event"), Some("Catering")))
            .await
            .unwrap();
        assert!(tx.id.as_str().starts_with("manual_"));
        assert_eq!(tx.amount, dec("-12.50"));
        assert_eq!(tx.date, "2024-08-05");
        assert_eq!(tx.description, "Lunch");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[test]
    fn test_manual_entry_validation() {
        let taxonomy = CategoryTaxonomy::default();
        let rejected = [
            entry(EntryKind::Expense, "12,505", Some("Banque"), None),
            entry(EntryKind::Expense, "1.000,00", Some("Banque"), None),
            entry(EntryKind::Expense, "0", Some("Banque"), None),
            entry(EntryKind::Expense, "10", None, None),
            entry(EntryKind::Expense, "10", Some("Event"), None),
            entry(EntryKind::Income, "10", Some("Event"), None),
            entry(EntryKind::Refund, "10", Some("Event"), None),
        ];
        for e in rejected {
            assert!(e.clone().into_transaction(&taxonomy).is_err(), "{:?}", e);
        }

        let mut blank = entry(EntryKind::Expense, "10", Some("Banque"), None);
        blank.description = "  ".to_string();
        assert!(blank.into_transaction(&taxonomy).is_err());

        let income = entry(EntryKind::Income, "-10", Some("MBU"), None)
            .into_transaction(&taxonomy)
            .unwrap();
        assert_eq!(income.amount, dec("10"));

        let refund = entry(EntryKind::Refund, "5", Some("Event"), Some("Catering"))
            .into_transaction(&taxonomy)
            .unwrap();
        assert!(refund.is_refund);
        assert_eq!(refund.refund_subcategory.as_deref(), Some("Catering"));
    }
}
