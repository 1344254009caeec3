//! Published metadata accompanying each dataset: chart-level descriptions and per-column
//! titles and units.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartMetadata {
    pub title: String,
    pub subtitle: Option<String>,
    pub citation: Option<String>,
    pub original_chart_url: Option<String>,
    pub note: Option<String>,
}

/// Metadata for one measurement column, keyed by its short name in the source CSV.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnMetadata {
    pub title_short: Option<String>,
    pub title_long: Option<String>,
    pub description_short: Option<String>,
    pub description_key: Vec<String>,
    pub unit: Option<String>,
    pub short_unit: Option<String>,
    pub citation_short: Option<String>,
    pub citation_long: Option<String>,
    pub last_updated: Option<String>,
    pub timespan: Option<String>,
}

impl ColumnMetadata {
    /// The most descriptive title available.
    pub fn title(&self) -> Option<&str> {
        self.title_long
            .as_deref()
            .or(self.title_short.as_deref())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetMetadata {
    pub chart: ChartMetadata,
    pub columns: BTreeMap<String, ColumnMetadata>,
    pub date_downloaded: Option<String>,
}

impl DatasetMetadata {
    /// Looks up a column by its source short name. Column names are folded the same way the
    /// schema normaliser folds them, so either spelling works.
    pub fn column(&self, short_name: &str) -> Option<&ColumnMetadata> {
        let folded = short_name.trim().to_lowercase();
        self.columns
            .iter()
            .find(|(name, _)| name.trim().to_lowercase() == folded)
            .map(|(_, column)| column)
    }
}

pub fn read_metadata<P: AsRef<Path>>(path: P) -> anyhow::Result<DatasetMetadata> {
    let path = path.as_ref();
    info!("Reading metadata from {}", path.display());
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read metadata from '{}'", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse metadata in '{}'", path.display()))
}
