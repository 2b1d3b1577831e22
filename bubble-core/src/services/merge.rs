//! Merge-on-import: keep the user's categorization across re-imports

use crate::domain::Transaction;

fn carry(incoming: &mut Option<String>, previous: &Option<String>) {
    let missing = incoming.as_deref().map_or(true, str::is_empty);
    let present = previous.as_deref().is_some_and(|s| !s.is_empty());
    if missing && present {
        *incoming = previous.clone();
    }
}

/// Copy categorization from the stored version of each incoming transaction
///
/// `previous[i]` is the stored record for `incoming[i]` (the `get_many` answer).
/// Statement fields always keep the incoming values. Returns how many incoming
/// records had a stored counterpart.
pub fn merge_with_previous(incoming: &mut [Transaction], previous: &[Option<Transaction>]) -> usize {
    let mut matched = 0;
    for (tx, prev) in incoming.iter_mut().zip(previous) {
        let Some(prev) = prev else { continue };
        matched += 1;

        carry(&mut tx.category, &prev.category);
        carry(&mut tx.subcategory, &prev.subcategory);
        if !tx.is_refund && prev.is_refund {
            tx.is_refund = true;
        }
        carry(&mut tx.refund_category, &prev.refund_category);
        carry(&mut tx.refund_subcategory, &prev.refund_subcategory);
        if tx.splits.is_empty() && !prev.splits.is_empty() {
            tx.splits = prev.splits.clone();
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Identity, Split};
    use rust_decimal::Decimal;

    fn tx(id: &str, amount: i64) -> Transaction {
        Transaction::new(Identity::new(id), "2024-08-05", "Coffee", Decimal::new(amount, 0))
    }

    #[test]
    fn test_keeps_previous_categorization() {
        let mut prev = tx("a", -10);
        prev.category = Some("Event".into());
        prev.subcategory = Some("Catering".into());
        prev.description = "old text".into();

        let mut incoming = vec![tx("a", -10), tx("b", -3)];
        let matched = merge_with_previous(&mut incoming, &[Some(prev), None]);

        assert_eq!(matched, 1);
        assert_eq!(incoming[0].category.as_deref(), Some("Event"));
        assert_eq!(incoming[0].subcategory.as_deref(), Some("Catering"));
        // statement fields come from the new file
        assert_eq!(incoming[0].description, "Coffee");
        assert!(incoming[1].category.is_none());
    }

    #[test]
    fn test_incoming_values_win() {
        let mut prev = tx("a", 10);
        prev.category = Some("MBU".into());
        let mut incoming = vec![tx("a", 10)];
        incoming[0].category = Some("SBU".into());

        merge_with_previous(&mut incoming, &[Some(prev)]);
        assert_eq!(incoming[0].category.as_deref(), Some("SBU"));
    }

    #[test]
    fn test_empty_string_counts_as_absent() {
        let mut prev = tx("a", -10);
        prev.category = Some("Banque".into());
        let mut incoming = vec![tx("a", -10)];
        incoming[0].category = Some(String::new());

        merge_with_previous(&mut incoming, &[Some(prev)]);
        assert_eq!(incoming[0].category.as_deref(), Some("Banque"));
    }

    #[test]
    fn test_refund_and_splits_carried() {
        let mut refund = tx("r", 20);
        refund.is_refund = true;
        refund.refund_category = Some("Event".into());

        let mut split = tx("s", -100);
        split.splits = vec![Split::new(Decimal::new(100, 0), "Local", None)];

        let mut incoming = vec![tx("r", 20), tx("s", -100)];
        let matched = merge_with_previous(&mut incoming, &[Some(refund), Some(split.clone())]);

        assert_eq!(matched, 2);
        assert!(incoming[0].is_refund);
        assert_eq!(incoming[0].refund_category.as_deref(), Some("Event"));
        assert_eq!(incoming[1].splits, split.splits);
    }
}
