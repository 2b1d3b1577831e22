//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "taxonomy": [{ "name": "Event", "label": "Events", "subcategories": ["Catering"] }],
//!   "incomeCategories": ["MBU", "SBU"],
//!   "report": { "primaryCategories": ["Event"], "vatRate": "0.21", ... }
//! }
//! ```
//! Every section is optional and falls back to the built-in defaults.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{CategoryDef, CategoryTaxonomy, ReportLayout};

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    taxonomy: Option<Vec<CategoryDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    income_categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    report: Option<ReportLayout>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Bubble configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub taxonomy: CategoryTaxonomy,
    pub report: ReportLayout,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            taxonomy: CategoryTaxonomy::default(),
            report: ReportLayout::default(),
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// The VAT rate can be overridden with `BUBBLE_VAT_RATE` (e.g. `0.06`).
    pub fn load(dir: &Path) -> Result<Self> {
        let settings_path = dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            match serde_json::from_str(&content) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(error = %e, "settings.json is invalid, using defaults");
                    SettingsFile::default()
                }
            }
        } else {
            SettingsFile::default()
        };

        let defaults = CategoryTaxonomy::default();
        let taxonomy = CategoryTaxonomy::new(
            raw.taxonomy
                .clone()
                .unwrap_or_else(|| defaults.categories().to_vec()),
            raw.income_categories
                .clone()
                .unwrap_or_else(|| defaults.income_categories().to_vec()),
        );

        let mut report = raw.report.clone().unwrap_or_default();
        if let Some(rate) = std::env::var("BUBBLE_VAT_RATE")
            .ok()
            .and_then(|v| v.trim().parse::<Decimal>().ok())
        {
            report.vat_rate = rate;
        }

        Ok(Self {
            taxonomy,
            report,
            _raw_settings: raw,
        })
    }

    /// Load config, first writing the built-in defaults when no settings.json exists
    ///
    /// Gives the user a complete file to edit. Environment overrides are not written.
    pub fn load_or_init(dir: &Path) -> Result<Self> {
        if !dir.join("settings.json").exists() {
            Config::default()
                .save(dir)
                .with_context(|| format!("Failed to write default settings in {}", dir.display()))?;
            tracing::info!(dir = %dir.display(), "wrote default settings.json");
        }
        Self::load(dir)
    }

    /// Save config to the data directory
    /// Preserves other settings that Bubble doesn't manage
    pub fn save(&self, dir: &Path) -> Result<()> {
        let settings_path = dir.join("settings.json");

        // Load existing settings to preserve fields we don't manage
        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            self._raw_settings.clone()
        };

        settings.taxonomy = Some(self.taxonomy.categories().to_vec());
        settings.income_categories = Some(self.taxonomy.income_categories().to_vec());
        settings.report = Some(self.report.clone());

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}
