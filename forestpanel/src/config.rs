use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::filter::AggregatePolicy;
use crate::COL;

/// A source series: its short name (used for panel column names), the CSV holding it and the
/// optional metadata JSON published next to it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    pub name: String,
    pub file: String,
    #[serde(default)]
    pub metadata_file: Option<String>,
}

impl DatasetConfig {
    pub fn new(name: &str, stem: &str) -> Self {
        Self {
            name: name.into(),
            file: format!("{stem}.csv"),
            metadata_file: Some(format!("{stem}.metadata.json")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Merge order. The first dataset seeds the panel and later datasets win registry conflicts.
    pub datasets: Vec<DatasetConfig>,
    pub geometry_file: String,
    pub year: Option<i64>,
    /// Geometry name -> code, for boundary files that carry a placeholder instead of a code.
    pub iso_overrides: BTreeMap<String, String>,
    pub sentinel_codes: Vec<String>,
    pub geo_key: String,
    pub geo_name_key: String,
    /// Source column holding the country code, renamed to `code` during normalisation.
    pub data_key: String,
    pub aggregate_separator: char,
    pub aggregate_policy: AggregatePolicy,
    pub prune_empty_columns: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("downloads"),
            datasets: vec![
                DatasetConfig::new("annual_change_forest_area", "annual-change-forest-area"),
                DatasetConfig::new("annual_deforestation", "annual-deforestation"),
                DatasetConfig::new("terrestrial_protected_areas", "terrestrial-protected-areas"),
                DatasetConfig::new("forest_area_share_land", "forest-area-as-share-of-land-area"),
                DatasetConfig::new("red_list_index", "red-list-index"),
            ],
            geometry_file: "ne_110m_admin_0_countries.geojson".into(),
            year: None,
            // Natural Earth 110m ships these two with ISO_A3 = -99
            iso_overrides: BTreeMap::from([
                ("France".to_string(), "FRA".to_string()),
                ("Norway".to_string(), "NOR".to_string()),
            ]),
            sentinel_codes: vec!["-99".into()],
            geo_key: COL::GEO_ISO_A3.into(),
            geo_name_key: COL::GEO_NAME.into(),
            data_key: COL::CODE.into(),
            aggregate_separator: '_',
            aggregate_policy: AggregatePolicy::default(),
            prune_empty_columns: false,
        }
    }
}

impl Config {
    pub fn dataset_names(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn geometry_path(&self) -> PathBuf {
        self.data_dir.join(&self.geometry_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_falls_back_to_defaults() -> anyhow::Result<()> {
        let config: Config = toml::from_str(
            r#"
            year = 2020
            geo_key = "iso_a3"

            [iso_overrides]
            Kosovo = "XKX"
            "#,
        )?;
        assert_eq!(config.year, Some(2020));
        assert_eq!(config.geo_key, "iso_a3");
        assert_eq!(config.data_key, COL::CODE);
        assert_eq!(config.iso_overrides.len(), 1);
        assert_eq!(config.iso_overrides["Kosovo"], "XKX");
        assert_eq!(config.datasets.len(), 5);
        assert_eq!(config.aggregate_policy, AggregatePolicy::MissingOrCompoundCode);
        Ok(())
    }

    #[test]
    fn datasets_keep_declared_order() -> anyhow::Result<()> {
        let config: Config = toml::from_str(
            r#"
            [[datasets]]
            name = "red_list_index"
            file = "red-list-index.csv"

            [[datasets]]
            name = "annual_deforestation"
            file = "annual-deforestation.csv"
            metadata_file = "annual-deforestation.metadata.json"
            "#,
        )?;
        assert_eq!(
            config.dataset_names(),
            vec!["red_list_index", "annual_deforestation"]
        );
        assert_eq!(config.datasets[0].metadata_file, None);
        Ok(())
    }
}
