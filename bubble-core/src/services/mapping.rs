//! Column mapping inference
//!
//! Guesses which CSV header holds which transaction field from French/English
//! bank export headings (ING Belgium style). The guess is always a valid value;
//! completeness is checked before normalizing.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A transaction field that can be read from a CSV column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnField {
    Date,
    Description,
    Amount,
    Currency,
    Counterparty,
    MovementId,
}

impl ColumnField {
    pub const ALL: [ColumnField; 6] = [
        ColumnField::Date,
        ColumnField::Description,
        ColumnField::Amount,
        ColumnField::Currency,
        ColumnField::Counterparty,
        ColumnField::MovementId,
    ];

    pub const REQUIRED: [ColumnField; 3] =
        [ColumnField::Date, ColumnField::Description, ColumnField::Amount];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnField::Date => "date",
            ColumnField::Description => "description",
            ColumnField::Amount => "amount",
            ColumnField::Currency => "currency",
            ColumnField::Counterparty => "counterparty",
            ColumnField::MovementId => "movement_id",
        }
    }

    /// Header patterns, tried against the lowercased header, most specific first
    fn patterns(&self) -> &'static [Regex] {
        static PATTERNS: OnceLock<Vec<Vec<Regex>>> = OnceLock::new();
        let all = PATTERNS.get_or_init(|| {
            let compile = |pats: &[&str]| -> Vec<Regex> {
                pats.iter()
                    .map(|p| Regex::new(p).expect("valid header pattern"))
                    .collect()
            };
            vec![
                compile(&["date comptable", r"date\b", "booking"]),
                compile(&["libell[ée]s?", "communication", "description"]),
                compile(&["montant", "amount"]),
                compile(&["devise", "currency"]),
                compile(&["contrepartie", "iban|compte"]),
                compile(&["num[ée]ro de mouvement", "mouvement|id"]),
            ]
        });
        &all[*self as usize]
    }
}

impl fmt::Display for ColumnField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which header feeds which field; `""` means not mapped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub date: String,
    pub description: String,
    pub amount: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub counterparty: String,
    #[serde(default)]
    pub movement_id: String,
}

impl ColumnMapping {
    pub fn get(&self, field: ColumnField) -> &str {
        match field {
            ColumnField::Date => &self.date,
            ColumnField::Description => &self.description,
            ColumnField::Amount => &self.amount,
            ColumnField::Currency => &self.currency,
            ColumnField::Counterparty => &self.counterparty,
            ColumnField::MovementId => &self.movement_id,
        }
    }

    /// Header for a field, `None` when unmapped
    pub fn header(&self, field: ColumnField) -> Option<&str> {
        Some(self.get(field)).filter(|h| !h.is_empty())
    }

    pub fn set(&mut self, field: ColumnField, header: impl Into<String>) {
        let header = header.into();
        match field {
            ColumnField::Date => self.date = header,
            ColumnField::Description => self.description = header,
            ColumnField::Amount => self.amount = header,
            ColumnField::Currency => self.currency = header,
            ColumnField::Counterparty => self.counterparty = header,
            ColumnField::MovementId => self.movement_id = header,
        }
    }

    /// Required fields that are not mapped
    pub fn missing_required(&self) -> Vec<&'static str> {
        ColumnField::REQUIRED
            .iter()
            .filter(|f| self.header(**f).is_none())
            .map(ColumnField::as_str)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    /// Apply user corrections on top of a guess
    pub fn with_overrides<I, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (ColumnField, S)>,
        S: Into<String>,
    {
        for (field, header) in overrides {
            self.set(field, header);
        }
        self
    }
}

/// Guess the column mapping from the CSV headers
///
/// For each field the first header (in file order) matching any of the field's
/// patterns wins. Unmatched fields stay `""`.
pub fn infer_mapping<S: AsRef<str>>(headers: &[S]) -> ColumnMapping {
    let lowered: Vec<String> = headers.iter().map(|h| h.as_ref().to_lowercase()).collect();

    let mut mapping = ColumnMapping::default();
    for field in ColumnField::ALL {
        let found = headers
            .iter()
            .zip(&lowered)
            .find(|(_, lower)| field.patterns().iter().any(|rx| rx.is_match(lower)))
            .map(|(h, _)| h.as_ref().to_string());
        if let Some(header) = found {
            mapping.set(field, header);
        }
    }
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_ing_headers() {
        let headers = [
            "Numéro de compte",
            "Nom du compte",
            "Compte partie adverse",
            "Numéro de mouvement",
            "Date comptable",
            "Date valeur",
            "Montant",
            "Devise",
            "Libellés",
            "Détails du mouvement",
        ];
        let mapping = infer_mapping(&headers);
        assert_eq!(mapping.date, "Date comptable");
        assert_eq!(mapping.description, "Libellés");
        assert_eq!(mapping.amount, "Montant");
        assert_eq!(mapping.currency, "Devise");
        // "compte" appears first in "Numéro de compte"
        assert_eq!(mapping.counterparty, "Numéro de compte");
        assert_eq!(mapping.movement_id, "Numéro de mouvement");
        assert!(mapping.is_complete());
    }

    #[test]
    fn test_header_order_beats_pattern_order() {
        // "Date" comes before "Date comptable" in the file, and matches `date\b`
        let mapping = infer_mapping(&["Date", "Date comptable", "Amount", "Description"]);
        assert_eq!(mapping.date, "Date");
    }

    #[test]
    fn test_english_headers() {
        let mapping = infer_mapping(&["Booking Date", "Description", "Amount", "Currency"]);
        assert_eq!(mapping.date, "Booking Date");
        assert_eq!(mapping.description, "Description");
        assert_eq!(mapping.amount, "Amount");
        assert_eq!(mapping.currency, "Currency");
        assert_eq!(mapping.movement_id, "");
    }

    #[test]
    fn test_date_word_boundary() {
        let mapping = infer_mapping(&["Dates", "Montant", "Libellé"]);
        assert_eq!(mapping.date, "");
        assert_eq!(mapping.missing_required(), vec!["date"]);
        assert!(!mapping.is_complete());
    }

    #[test]
    fn test_overrides() {
        let mapping = infer_mapping(&["Dates", "Montant", "Libellé"])
            .with_overrides([(ColumnField::Date, "Dates")]);
        assert_eq!(mapping.header(ColumnField::Date), Some("Dates"));
        assert!(mapping.is_complete());
    }

    #[test]
    fn test_empty_headers() {
        let mapping = infer_mapping::<&str>(&[]);
        assert_eq!(mapping, ColumnMapping::default());
        assert_eq!(mapping.missing_required().len(), 3);
    }
}
