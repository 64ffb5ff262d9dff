//! Report configuration: which table columns feed which metrics.
//!
//! Mappings are plain YAML files loaded in full before any table work
//! starts; the core never reads ambient process state.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Column mapping for a report run. Every field is optional; metrics whose
/// role is unmapped are simply not computed. A mapped column that the table
/// lacks is a hard error at build time, never silently skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spend_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clicks_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impressions_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversions_column: Option<String>,
    /// Column whose per-row values pick the top and bottom performer rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking_column: Option<String>,
    /// Column carrying row dates; enables the reporting period and dated
    /// performer labels in the summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_column: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            spend_column: Some("spend".to_string()),
            clicks_column: Some("clicks".to_string()),
            impressions_column: Some("impressions".to_string()),
            conversions_column: Some("conversions".to_string()),
            ranking_column: Some("spend".to_string()),
            date_column: None,
        }
    }
}

impl ReportConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening mapping file {path:?}"))?;
        let reader = BufReader::new(file);
        let config: ReportConfig =
            serde_yaml::from_reader(reader).context("Parsing mapping YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Configured metric role columns in the fixed report order.
    pub fn role_columns(&self) -> Vec<(&'static str, &str)> {
        [
            ("spend", self.spend_column.as_deref()),
            ("clicks", self.clicks_column.as_deref()),
            ("impressions", self.impressions_column.as_deref()),
            ("conversions", self.conversions_column.as_deref()),
        ]
        .into_iter()
        .filter_map(|(role, column)| column.map(|column| (role, column)))
        .collect()
    }

    /// Every configured column with its role label, for validation output.
    pub fn configured_columns(&self) -> Vec<(&'static str, &str)> {
        let mut entries = self.role_columns();
        if let Some(column) = self.ranking_column.as_deref() {
            entries.push(("ranking", column));
        }
        if let Some(column) = self.date_column.as_deref() {
            entries.push(("date", column));
        }
        entries
    }

    fn validate(&self) -> Result<()> {
        for (role, column) in self.configured_columns() {
            if column.trim().is_empty() {
                bail!("Mapping entry '{role}' must name a column");
            }
        }
        Ok(())
    }
}
