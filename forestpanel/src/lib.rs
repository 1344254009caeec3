use std::collections::BTreeMap;

use anyhow::Result;
use itertools::Itertools;
use log::{debug, info, warn};
use nonempty::NonEmpty;
use polars::frame::DataFrame;

use crate::accessor::EntityAccessor;
use crate::config::Config;
use crate::disambiguate::{disambiguate, ColumnOrigin};
use crate::error::{ForestPanelError, ForestPanelResult};
use crate::filter::AggregateFilter;
use crate::geo_join::GeoJoin;
use crate::metadata::{ColumnMetadata, DatasetMetadata};
use crate::normalize::{normalize, rename_code_column, require_columns};
use crate::registry::EntityRegistry;
use crate::source::RawDataset;

// Re-exports
pub use column_names as COL;

// Modules
pub mod accessor;
pub mod column_names;
pub mod config;
pub mod disambiguate;
pub mod error;
pub mod filter;
#[cfg(feature = "formatters")]
pub mod formatters;
pub mod geo_join;
pub mod merge;
pub mod metadata;
pub mod normalize;
pub mod registry;
pub mod source;

/// Table name used by the accessor over the geo-joined table.
pub const JOINED_TABLE: &str = "joined";

/// The result of one pipeline run. Everything is computed up front and never mutated.
#[derive(Debug)]
pub struct ForestPanel {
    pub config: Config,
    /// Normalised datasets in merge order, aggregates included
    datasets: Vec<RawDataset>,
    metadata: BTreeMap<String, DatasetMetadata>,
    registry: EntityRegistry,
    origins: Vec<ColumnOrigin>,
    panel: DataFrame,
    joined: Option<DataFrame>,
}

impl ForestPanel {
    /// Runs the pipeline over the files in the default data directory
    pub fn new() -> Result<Self> {
        Self::new_with_config(Config::default())
    }

    /// Loads every configured dataset, its metadata and the geometries from `config.data_dir`
    /// and runs the pipeline. A missing geometry file leaves the joined table unpopulated.
    pub fn new_with_config(config: Config) -> Result<Self> {
        debug!("config: {config:?}");
        let mut sources = vec![];
        let mut metadata = BTreeMap::new();
        for dataset in &config.datasets {
            sources.push(source::read_dataset_csv(
                &dataset.name,
                config.data_dir.join(&dataset.file),
            )?);
            if let Some(file) = &dataset.metadata_file {
                let path = config.data_dir.join(file);
                if path.exists() {
                    metadata.insert(dataset.name.clone(), metadata::read_metadata(path)?);
                } else {
                    warn!("No metadata for '{}' at {}", dataset.name, path.display());
                }
            }
        }

        let geometry_path = config.geometry_path();
        let geometries = if geometry_path.exists() {
            Some(geo_join::read_geometries(
                &geometry_path,
                &config.geo_name_key,
                &config.geo_key,
            )?)
        } else {
            warn!("Geometry file {} not found", geometry_path.display());
            None
        };

        Ok(Self::from_sources(config, sources, geometries)?.with_metadata(metadata))
    }

    /// Runs the pipeline over already loaded tables, given in merge order.
    pub fn from_sources(
        config: Config,
        sources: Vec<RawDataset>,
        geometries: Option<DataFrame>,
    ) -> ForestPanelResult<Self> {
        if let Some(name) = sources.iter().map(|d| &d.name).duplicates().next() {
            return Err(ForestPanelError::DuplicateDataset(name.clone()));
        }
        let filter = AggregateFilter::new(config.aggregate_policy, config.aggregate_separator);

        let mut datasets = vec![];
        let mut filtered = vec![];
        for source in sources {
            let data = normalize(&source.name, source.data)?;
            let data = rename_code_column(&source.name, data, &config.data_key)?;
            require_columns(&source.name, &data, &COL::KEY_COLUMNS)?;
            filtered.push(filter.apply(&source.name, data.clone())?);
            datasets.push(RawDataset::new(&source.name, data));
        }

        let registry = EntityRegistry::build(
            datasets
                .iter()
                .zip(&filtered)
                .map(|(dataset, df)| (dataset.name.as_str(), df)),
        )?;

        let cleaned = datasets
            .iter()
            .zip(filtered)
            .map(|(dataset, df)| disambiguate(&dataset.name, df))
            .collect::<ForestPanelResult<Vec<_>>>()?;
        let cleaned = NonEmpty::from_vec(cleaned).ok_or(ForestPanelError::NoDatasets)?;
        let origins = cleaned
            .iter()
            .flat_map(|dataset| dataset.origins.clone())
            .collect_vec();

        let mut panel = merge::merge_datasets(&cleaned, &registry)?;
        if config.prune_empty_columns {
            panel = merge::prune_empty_value_columns(&panel)?;
        }

        let joined = geometries
            .map(|geometries| GeoJoin::from(&config).join(&geometries, &panel))
            .transpose()?;
        info!(
            "Pipeline finished: panel {:?}, joined {:?}",
            panel.shape(),
            joined.as_ref().map(DataFrame::shape)
        );

        Ok(Self {
            config,
            datasets,
            metadata: BTreeMap::new(),
            registry,
            origins,
            panel,
            joined,
        })
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, DatasetMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn dataset_names(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name.as_str()).collect()
    }

    /// Entity lookups over one normalised dataset, aggregate rows included.
    pub fn dataset(&self, name: &str) -> EntityAccessor<'_> {
        let table = self
            .datasets
            .iter()
            .find(|d| d.name == name)
            .map(|d| &d.data);
        EntityAccessor::new(name, table)
    }

    /// Entity lookups over the geo-joined table.
    pub fn joined(&self) -> EntityAccessor<'_> {
        EntityAccessor::new(JOINED_TABLE, self.joined.as_ref())
    }

    pub fn joined_table(&self) -> Option<&DataFrame> {
        self.joined.as_ref()
    }

    pub fn panel(&self) -> &DataFrame {
        &self.panel
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn origins(&self) -> &[ColumnOrigin] {
        &self.origins
    }

    pub fn metadata(&self, dataset: &str) -> Option<&DatasetMetadata> {
        self.metadata.get(dataset)
    }

    /// Metadata of the source column that became `panel_column`.
    pub fn column_metadata(&self, panel_column: &str) -> Option<&ColumnMetadata> {
        let origin = self
            .origins
            .iter()
            .find(|o| o.panel_column == panel_column)?;
        self.metadata(&origin.dataset)?
            .column(&origin.source_column)
    }
}
