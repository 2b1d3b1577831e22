//! Transaction domain model

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use super::result::{Error, Result};
use super::taxonomy::CategoryTaxonomy;

/// Maximum length (in characters) of a content-based identity
pub const CONTENT_IDENTITY_MAX_CHARS: usize = 120;

/// Tolerance allowed between the split total and the transaction amount
pub const SPLIT_SUM_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// Stable upsert key of a transaction
///
/// Either the bank movement id, or a truncated `date|amount|description` key.
/// Not to be confused with [`ContentFingerprint`], which is only used to group
/// same-operation duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Content-based identity used when no movement id is available
    pub fn from_content(date: &str, amount: Decimal, description: &str) -> Self {
        let key = format!("{}|{}|{}", date, display_amount(amount), description);
        Self(key.chars().take(CONTENT_IDENTITY_MAX_CHARS).collect())
    }

    /// Fresh identity for a manually entered transaction
    pub fn manual() -> Self {
        Self(format!("manual_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse "same real-world operation" key used by the deduplicator
///
/// `date|amount rounded to 2 decimals|normalized description`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn of(tx: &Transaction) -> Self {
        // halves round toward +inf: 1.125 -> 1.13, -1.125 -> -1.12
        let strategy = if tx.amount.is_sign_negative() {
            RoundingStrategy::MidpointTowardZero
        } else {
            RoundingStrategy::MidpointAwayFromZero
        };
        let rounded = tx.amount.round_dp_with_strategy(2, strategy);
        // -0.00 and 0.00 must group together
        let rounded = if rounded.is_zero() { Decimal::ZERO } else { rounded };
        Self(format!(
            "{}|{:.2}|{}",
            tx.date,
            rounded,
            normalize_description(&tx.description)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a description for fingerprint comparison
///
/// Lowercase, strip diacritics (NFD + drop combining marks), collapse whitespace.
pub fn normalize_description(desc: &str) -> String {
    let folded: String = desc
        .to_lowercase()
        .nfd()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Shortest textual form of an amount (`-4.5`, `100`, `1234.56`)
pub fn display_amount(amount: Decimal) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }
    amount.normalize().to_string()
}

/// One statement line as read from the CSV, header -> cell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRow(BTreeMap<String, String>);

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.0.get(header).map(String::as_str)
    }

    pub fn insert(&mut self, header: impl Into<String>, value: impl Into<String>) {
        self.0.insert(header.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A portion of an outflow allocated to one expense category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    /// Unique within the owning transaction
    pub id: String,
    /// Positive share of the owning transaction's absolute amount
    pub amount: Decimal,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
}

impl Split {
    pub fn new(amount: Decimal, category: impl Into<String>, subcategory: Option<String>) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("s_{}", &id[..8]),
            amount,
            category: category.into(),
            subcategory: subcategory.filter(|s| !s.is_empty()),
        }
    }
}

/// A single money movement
///
/// Categorization is stored field by field because the store accepts whatever it
/// is given and both merge passes work field-wise. Read it through
/// [`Transaction::classification`] and change it through [`Transaction::apply`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Identity,
    /// `YYYY-MM-DD`, or the verbatim cell when the date could not be read
    pub date: String,
    pub description: String,
    /// Positive = inflow, negative = outflow
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement_id: Option<String>,

    // =========================================================================
    // Categorization
    // =========================================================================
    /// Expense category (outflow without splits) or income category (inflow)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub is_refund: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_subcategory: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub splits: Vec<Split>,

    /// Original statement line, kept for auditing
    #[serde(default)]
    pub raw: RawRow,
}

/// What a transaction's categorization means
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    Unclassified,
    Expense {
        category: String,
        subcategory: Option<String>,
    },
    Split {
        splits: Vec<Split>,
    },
    Income {
        category: String,
    },
    Refund {
        category: Option<String>,
        subcategory: Option<String>,
    },
}

/// A user edit of a transaction's categorization
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationEdit {
    /// Set (or clear with `""`) the expense category; resets the subcategory
    ExpenseCategory(String),
    ExpenseSubcategory(Option<String>),
    /// Set (or clear with `""`) the income category
    IncomeCategory(String),
    /// Mark or unmark an inflow as a refund; both directions reset refund fields
    Refund(bool),
    /// Set (or clear with `""`) the refunded category; resets the refund subcategory
    RefundCategory(String),
    RefundSubcategory(Option<String>),
    Splits(Vec<Split>),
    ClearSplits,
    Clear,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

impl Transaction {
    /// Create a new uncategorized transaction with required fields
    pub fn new(
        id: Identity,
        date: impl Into<String>,
        description: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            id,
            date: date.into(),
            description: description.into(),
            amount,
            currency: None,
            counterparty: None,
            movement_id: None,
            category: None,
            subcategory: None,
            is_refund: false,
            refund_category: None,
            refund_subcategory: None,
            splits: Vec::new(),
            raw: RawRow::new(),
        }
    }

    pub fn is_inflow(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_outflow(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    pub fn has_splits(&self) -> bool {
        !self.splits.is_empty()
    }

    pub fn fingerprint(&self) -> ContentFingerprint {
        ContentFingerprint::of(self)
    }

    pub fn category(&self) -> Option<&str> {
        present(&self.category)
    }

    pub fn subcategory(&self) -> Option<&str> {
        present(&self.subcategory)
    }

    pub fn refund_category(&self) -> Option<&str> {
        present(&self.refund_category)
    }

    pub fn refund_subcategory(&self) -> Option<&str> {
        present(&self.refund_subcategory)
    }

    pub fn movement_id(&self) -> Option<&str> {
        present(&self.movement_id)
    }

    /// Whether the user has attached any categorization at all
    pub fn is_categorized(&self) -> bool {
        self.category().is_some() || self.is_refund || self.has_splits()
    }

    /// Interpret the stored categorization fields
    ///
    /// Fields that do not apply to the transaction's sign are ignored: an outflow
    /// never reads as a refund, and a split outflow never reads its top-level
    /// category.
    pub fn classification(&self) -> Classification {
        if self.is_outflow() {
            if self.has_splits() {
                return Classification::Split {
                    splits: self.splits.clone(),
                };
            }
            return match self.category() {
                Some(category) => Classification::Expense {
                    category: category.to_string(),
                    subcategory: self.subcategory().map(str::to_string),
                },
                None => Classification::Unclassified,
            };
        }

        if self.is_inflow() {
            if self.is_refund {
                return Classification::Refund {
                    category: self.refund_category().map(str::to_string),
                    subcategory: self.refund_subcategory().map(str::to_string),
                };
            }
            if let Some(category) = self.category() {
                return Classification::Income {
                    category: category.to_string(),
                };
            }
        }

        Classification::Unclassified
    }

    /// Apply a categorization edit, validating it against the taxonomy
    ///
    /// On error the transaction is left untouched.
    pub fn apply(&mut self, edit: ClassificationEdit, taxonomy: &CategoryTaxonomy) -> Result<()> {
        match edit {
            ClassificationEdit::ExpenseCategory(category) => {
                self.require_outflow()?;
                if self.has_splits() {
                    return Err(Error::validation(
                        "Transaction is split; clear the splits before setting a category",
                    ));
                }
                let category = non_empty(category);
                if let Some(c) = &category {
                    taxonomy.require_category(c)?;
                }
                self.category = category;
                self.subcategory = None;
            }
            ClassificationEdit::ExpenseSubcategory(subcategory) => {
                self.require_outflow()?;
                let subcategory = subcategory.and_then(non_empty);
                if let Some(sub) = &subcategory {
                    let category = self.category().ok_or_else(|| {
                        Error::validation("Set a category before its subcategory")
                    })?;
                    taxonomy.require_subcategory(category, sub)?;
                }
                self.subcategory = subcategory;
            }
            ClassificationEdit::IncomeCategory(category) => {
                self.require_inflow()?;
                if self.is_refund {
                    return Err(Error::validation(
                        "Refunds carry a refund category, not an income category",
                    ));
                }
                let category = non_empty(category);
                if let Some(c) = &category {
                    if !taxonomy.is_income_category(c) {
                        return Err(Error::validation(format!("Unknown income category: {}", c)));
                    }
                }
                self.category = category;
            }
            ClassificationEdit::Refund(is_refund) => {
                self.require_inflow()?;
                if is_refund {
                    self.category = None;
                }
                self.is_refund = is_refund;
                self.refund_category = None;
                self.refund_subcategory = None;
            }
            ClassificationEdit::RefundCategory(category) => {
                self.require_refund()?;
                let category = non_empty(category);
                if let Some(c) = &category {
                    taxonomy.require_category(c)?;
                }
                self.refund_category = category;
                self.refund_subcategory = None;
            }
            ClassificationEdit::RefundSubcategory(subcategory) => {
                self.require_refund()?;
                let subcategory = subcategory.and_then(non_empty);
                if let Some(sub) = &subcategory {
                    let category = self.refund_category().ok_or_else(|| {
                        Error::validation("Set a refund category before its subcategory")
                    })?;
                    taxonomy.require_subcategory(category, sub)?;
                }
                self.refund_subcategory = subcategory;
            }
            ClassificationEdit::Splits(splits) => {
                self.require_outflow()?;
                validate_splits(&splits, self.amount.abs(), taxonomy)?;
                self.splits = splits;
                self.category = None;
                self.subcategory = None;
            }
            ClassificationEdit::ClearSplits => {
                self.splits.clear();
            }
            ClassificationEdit::Clear => {
                self.category = None;
                self.subcategory = None;
                self.is_refund = false;
                self.refund_category = None;
                self.refund_subcategory = None;
                self.splits.clear();
            }
        }
        Ok(())
    }

    fn require_outflow(&self) -> Result<()> {
        if self.is_outflow() {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "Transaction {} is not an expense",
                self.id
            )))
        }
    }

    fn require_inflow(&self) -> Result<()> {
        if self.is_inflow() {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "Transaction {} is not an inflow",
                self.id
            )))
        }
    }

    fn require_refund(&self) -> Result<()> {
        self.require_inflow()?;
        if self.is_refund {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "Transaction {} is not marked as a refund",
                self.id
            )))
        }
    }
}

/// Check a split allocation against the amount it divides
pub fn validate_splits(splits: &[Split], total: Decimal, taxonomy: &CategoryTaxonomy) -> Result<()> {
    if splits.is_empty() {
        return Err(Error::validation("A split needs at least one line"));
    }

    let mut seen = std::collections::HashSet::new();
    for split in splits {
        if !seen.insert(split.id.as_str()) {
            return Err(Error::validation(format!("Duplicate split id: {}", split.id)));
        }
        if split.amount <= Decimal::ZERO {
            return Err(Error::validation("Split amounts must be positive"));
        }
        if split.category.trim().is_empty() {
            return Err(Error::validation("Every split line needs a category"));
        }
        taxonomy.require_category(&split.category)?;
        if let Some(sub) = split.subcategory.as_deref().filter(|s| !s.is_empty()) {
            taxonomy.require_subcategory(&split.category, sub)?;
        }
    }

    let sum: Decimal = splits.iter().map(|s| s.amount).sum();
    if (sum - total).abs() >= SPLIT_SUM_TOLERANCE {
        return Err(Error::validation(format!(
            "Split total {} does not match the expense amount {}",
            display_amount(sum),
            display_amount(total)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn outflow(amount: &str) -> Transaction {
        Transaction::new(Identity::new("tx-1"), "2024-08-05", "Coffee", dec(amount))
    }

    #[test]
    fn test_content_identity_uses_shortest_amount() {
        let id = Identity::from_content("2024-08-05", dec("-4.50"), "Coffee");
        assert_eq!(id.as_str(), "2024-08-05|-4.5|Coffee");

        let id = Identity::from_content("2024-08-05", dec("100.00"), "Rent");
        assert_eq!(id.as_str(), "2024-08-05|100|Rent");
    }

    #[test]
    fn test_content_identity_is_truncated() {
        let long = "x".repeat(300);
        let id = Identity::from_content("2024-08-05", dec("-1"), &long);
        assert_eq!(id.as_str().chars().count(), CONTENT_IDENTITY_MAX_CHARS);
    }

    #[test]
    fn test_fingerprint_normalizes_description() {
        let mut a = outflow("-12.3");
        a.description = "  Café   de la GARE ".to_string();
        let mut b = outflow("-12.30");
        b.description = "cafe de la gare".to_string();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().as_str(), "2024-08-05|-12.30|cafe de la gare");
    }

    #[test]
    fn test_fingerprint_rounds_halves_up() {
        let mut tx = Transaction::new(Identity::new("a"), "2024-08-05", "x", dec("-1.125"));
        assert_eq!(tx.fingerprint().as_str(), "2024-08-05|-1.12|x");

        tx.amount = dec("1.125");
        assert_eq!(tx.fingerprint().as_str(), "2024-08-05|1.13|x");

        tx.amount = dec("-1.126");
        assert_eq!(tx.fingerprint().as_str(), "2024-08-05|-1.13|x");

        tx.amount = dec("-0.004");
        assert_eq!(tx.fingerprint().as_str(), "2024-08-05|0.00|x");
    }

    #[test]
    fn test_fingerprint_differs_from_identity() {
        let mut a = outflow("-4.5");
        a.id = Identity::new("MV-1");
        let mut b = outflow("-4.5");
        b.id = Identity::new("MV-2");
        assert_ne!(a.id, b.id);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_normalize_description() {
        assert_eq!(normalize_description("Élève  École\tÀ"), "eleve ecole a");
        assert_eq!(normalize_description(""), "");
    }

    #[test]
    fn test_classification_of_split_ignores_category() {
        let mut tx = outflow("-100");
        tx.category = Some("Event".to_string());
        tx.splits = vec![Split::new(dec("100"), "Local", None)];
        assert!(matches!(tx.classification(), Classification::Split { .. }));
    }

    #[test]
    fn test_classification_of_inflows() {
        let mut tx = outflow("30");
        assert_eq!(tx.classification(), Classification::Unclassified);

        tx.category = Some("MBU".to_string());
        assert_eq!(
            tx.classification(),
            Classification::Income { category: "MBU".to_string() }
        );

        tx.is_refund = true;
        tx.refund_category = Some("Event".to_string());
        assert_eq!(
            tx.classification(),
            Classification::Refund {
                category: Some("Event".to_string()),
                subcategory: None
            }
        );
    }

    #[test]
    fn test_outflow_never_reads_as_refund() {
        let mut tx = outflow("-30");
        tx.is_refund = true;
        tx.refund_category = Some("Event".to_string());
        assert_eq!(tx.classification(), Classification::Unclassified);
    }

    #[test]
    fn test_apply_splits_clears_category() {
        let taxonomy = CategoryTaxonomy::default();
        let mut tx = outflow("-100");
        tx.apply(ClassificationEdit::ExpenseCategory("Event".to_string()), &taxonomy)
            .unwrap();
        tx.apply(
            ClassificationEdit::Splits(vec![
                Split::new(dec("60"), "Event", None),
                Split::new(dec("40"), "Local", None),
            ]),
            &taxonomy,
        )
        .unwrap();
        assert!(tx.category.is_none());
        assert!(tx.subcategory.is_none());
        assert_eq!(tx.splits.len(), 2);
    }

    #[test]
    fn test_apply_rejects_mismatched_split_sum() {
        let taxonomy = CategoryTaxonomy::default();
        let mut tx = outflow("-100");
        let err = tx
            .apply(
                ClassificationEdit::Splits(vec![Split::new(dec("60"), "Event", None)]),
                &taxonomy,
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(tx.splits.is_empty());
    }

    #[test]
    fn test_apply_accepts_split_sum_within_tolerance() {
        let taxonomy = CategoryTaxonomy::default();
        let mut tx = outflow("-10");
        tx.apply(
            ClassificationEdit::Splits(vec![
                Split::new(dec("3.33"), "Event", None),
                Split::new(dec("6.666"), "Local", None),
            ]),
            &taxonomy,
        )
        .unwrap();
    }

    #[test]
    fn test_apply_refund_toggle_resets_fields() {
        let taxonomy = CategoryTaxonomy::default();
        let mut tx = outflow("30");
        tx.apply(ClassificationEdit::IncomeCategory("MBU".to_string()), &taxonomy)
            .unwrap();
        tx.apply(ClassificationEdit::Refund(true), &taxonomy).unwrap();
        assert!(tx.category.is_none());
        tx.apply(ClassificationEdit::RefundCategory("Event".to_string()), &taxonomy)
            .unwrap();
        assert_eq!(tx.refund_category(), Some("Event"));

        tx.apply(ClassificationEdit::Refund(false), &taxonomy).unwrap();
        assert!(!tx.is_refund);
        assert!(tx.refund_category.is_none());
    }

    #[test]
    fn test_apply_rejects_wrong_sign() {
        let taxonomy = CategoryTaxonomy::default();
        let mut tx = outflow("-30");
        assert!(tx.apply(ClassificationEdit::Refund(true), &taxonomy).is_err());
        assert!(tx
            .apply(ClassificationEdit::IncomeCategory("MBU".to_string()), &taxonomy)
            .is_err());
    }

    #[test]
    fn test_apply_rejects_unknown_category() {
        let taxonomy = CategoryTaxonomy::default();
        let mut tx = outflow("-30");
        let err = tx
            .apply(ClassificationEdit::ExpenseCategory("Nope".to_string()), &taxonomy)
            .unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }

    #[test]
    fn test_serde_uses_camel_case() {
        let mut tx = outflow("-4.5");
        tx.movement_id = Some("MV-1".to_string());
        tx.is_refund = false;
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["movementId"], "MV-1");
        assert_eq!(json["isRefund"], false);
        assert!(json.get("splits").is_none());

        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }
}
