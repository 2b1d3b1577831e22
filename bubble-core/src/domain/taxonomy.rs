//! Category taxonomy and report layout

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Bucket for money whose (sub)category is missing
pub const UNCLASSIFIED: &str = "Unclassified";

/// Single bucket of a category that declares no subcategories
pub const TOTAL: &str = "Total";

/// An expense category and its declared subcategories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub subcategories: Vec<String>,
}

impl CategoryDef {
    pub fn new(name: impl Into<String>, subcategories: &[&str]) -> Self {
        Self {
            name: name.into(),
            label: None,
            subcategories: subcategories.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Display label, falling back to the category name
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// The expense and income categories a user can pick from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTaxonomy {
    categories: Vec<CategoryDef>,
    income_categories: Vec<String>,
}

impl CategoryTaxonomy {
    pub fn new(categories: Vec<CategoryDef>, income_categories: Vec<String>) -> Self {
        Self {
            categories,
            income_categories,
        }
    }

    /// Expense categories in configured order
    pub fn categories(&self) -> &[CategoryDef] {
        &self.categories
    }

    pub fn income_categories(&self) -> &[String] {
        &self.income_categories
    }

    pub fn get(&self, name: &str) -> Option<&CategoryDef> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Declared subcategories (empty for unknown categories)
    pub fn subcategories(&self, name: &str) -> &[String] {
        self.get(name).map(|c| c.subcategories.as_slice()).unwrap_or(&[])
    }

    pub fn declares_subcategories(&self, name: &str) -> bool {
        !self.subcategories(name).is_empty()
    }

    /// Display label of a category; unknown categories display as themselves
    pub fn label<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name).map(CategoryDef::label).unwrap_or(name)
    }

    pub fn is_income_category(&self, name: &str) -> bool {
        self.income_categories.iter().any(|c| c == name)
    }

    pub(crate) fn require_category(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(Error::validation(format!("Unknown category: {}", name)))
        }
    }

    pub(crate) fn require_subcategory(&self, category: &str, sub: &str) -> Result<()> {
        self.require_category(category)?;
        if self.subcategories(category).iter().any(|s| s == sub) {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "Unknown subcategory for {}: {}",
                category, sub
            )))
        }
    }
}

impl Default for CategoryTaxonomy {
    fn default() -> Self {
        let categories = vec![
            CategoryDef::new("Advertising", &["Réseaux sociaux", "Print", "Goodies"]),
            CategoryDef::new("Abonnement", &["Logiciels", "Téléphonie", "Hébergement"])
                .with_label("Abonnements"),
            CategoryDef::new("Recruiting", &["Salons", "Annonces"]),
            CategoryDef::new("Networking", &["JEE", "Événements externes"])
                .with_label("Networking + JEE"),
            CategoryDef::new("Event", &["Location salle", "Catering", "Matériel"]),
            CategoryDef::new("Local", &["Fournitures", "Entretien"]).with_label("Achats local"),
            CategoryDef::new("Amende", &[]),
            CategoryDef::new("BSBG(-)", &[]),
            CategoryDef::new("Achats projets (cdv, rdv clients, etc)", &[]),
            CategoryDef::new("Entreprenariat / Innovation", &[])
                .with_label("Entreprenariat/Innovation"),
            CategoryDef::new("Marge sécuritaire", &[]),
            CategoryDef::new("Assurances", &[]),
            CategoryDef::new("Banque", &[]),
            CategoryDef::new("Moniteur Belge", &[]),
        ];
        let income_categories = [
            "MBU",
            "SBU",
            "EBU",
            "QBU",
            "BSBG(+)",
            "Formations",
            "Partenariats",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        Self::new(categories, income_categories)
    }
}

/// How the budget overview groups categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportLayout {
    /// Expense categories shown first, in this order
    pub primary_categories: Vec<String>,
    pub operating_income: Vec<String>,
    pub non_operating_income: Vec<String>,
    pub operating_expenses: Vec<String>,
    pub extra_costs: Vec<String>,
    /// VAT rate used for tax-exclusive figures (0.21 = 21%)
    pub vat_rate: Decimal,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            primary_categories: strings(&[
                "Advertising",
                "Abonnement",
                "Recruiting",
                "Networking",
                "Event",
                "Local",
            ]),
            operating_income: strings(&["MBU", "SBU", "EBU", "QBU"]),
            non_operating_income: strings(&["BSBG(+)", "Formations", "Partenariats"]),
            operating_expenses: strings(&[
                "Advertising",
                "Recruiting",
                "Amende",
                "Networking",
                "BSBG(-)",
                "Abonnement",
                "Event",
                "Achats projets (cdv, rdv clients, etc)",
                "Entreprenariat / Innovation",
                "Local",
                "Marge sécuritaire",
            ]),
            extra_costs: strings(&["Assurances", "Banque", "Moniteur Belge"]),
            vat_rate: Decimal::new(21, 2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_taxonomy_lookup() {
        let taxonomy = CategoryTaxonomy::default();
        assert!(taxonomy.contains("Event"));
        assert!(taxonomy.declares_subcategories("Event"));
        assert!(!taxonomy.declares_subcategories("Banque"));
        assert!(taxonomy.subcategories("Unknown").is_empty());
        assert!(taxonomy.is_income_category("MBU"));
        assert!(!taxonomy.is_income_category("Event"));
    }

    #[test]
    fn test_labels() {
        let taxonomy = CategoryTaxonomy::default();
        assert_eq!(taxonomy.label("Abonnement"), "Abonnements");
        assert_eq!(taxonomy.label("Banque"), "Banque");
        assert_eq!(taxonomy.label("Ad hoc"), "Ad hoc");
    }

    #[test]
    fn test_require_subcategory() {
        let taxonomy = CategoryTaxonomy::default();
        assert!(taxonomy.require_subcategory("Event", "Catering").is_ok());
        assert!(taxonomy.require_subcategory("Event", "Print").is_err());
        assert!(taxonomy.require_subcategory("Nope", "Print").is_err());
    }

    #[test]
    fn test_report_layout_partial_json_uses_defaults() {
        let layout: ReportLayout = serde_json::from_str(r#"{"vatRate": "0.06"}"#).unwrap();
        assert_eq!(layout.vat_rate, Decimal::new(6, 2));
        assert_eq!(layout.extra_costs.len(), 3);
    }
}
