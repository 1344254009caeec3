//! Resolution of country codes to a single display name across all datasets.

use std::collections::{BTreeMap, BTreeSet};

use itertools::izip;
use log::{debug, info, warn};
use polars::prelude::*;

use crate::error::{ForestPanelError, ForestPanelResult};
use crate::COL;

/// Read-only map from code to entity name.
///
/// The only constructor scans every dataset up front, so the registry cannot be consulted before
/// it is complete. Within a dataset the last row for a code wins, and across datasets the later
/// dataset in merge order wins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityRegistry {
    entries: BTreeMap<String, String>,
}

impl EntityRegistry {
    /// Builds the registry from normalised, aggregate-filtered datasets given in merge order.
    ///
    /// A code that never appears with an entity name is registered under the code itself.
    pub fn build<'a, I>(datasets: I) -> ForestPanelResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a DataFrame)>,
    {
        let mut entries = BTreeMap::new();
        let mut unnamed = BTreeSet::new();
        for (table, df) in datasets {
            let before = entries.len();
            for (code, entity) in Self::pairs(table, df)? {
                match entity {
                    Some(entity) => {
                        unnamed.remove(&code);
                        entries.insert(code, entity);
                    }
                    None => {
                        if !entries.contains_key(&code) {
                            unnamed.insert(code.clone());
                            entries.insert(code.clone(), code);
                        }
                    }
                }
            }
            debug!(
                "[{table}] registry gained {} new codes",
                entries.len() - before
            );
        }
        if !unnamed.is_empty() {
            warn!("Codes without an entity name, using the code instead: {unnamed:?}");
        }
        info!("Entity registry built with {} codes", entries.len());
        Ok(Self { entries })
    }

    fn pairs(table: &str, df: &DataFrame) -> ForestPanelResult<Vec<(String, Option<String>)>> {
        let column = |name: &str| {
            df.column(name)
                .and_then(|s| s.cast(&DataType::String))
                .map_err(|_| ForestPanelError::MissingColumn {
                    table: table.into(),
                    column: name.into(),
                })
        };
        let codes = column(COL::CODE)?;
        let entities = column(COL::ENTITY)?;
        Ok(izip!(codes.str()?, entities.str()?)
            .filter_map(|(code, entity)| {
                code.map(|code| (code.to_string(), entity.map(str::to_string)))
            })
            .collect())
    }

    /// The display name for `code`, or `None` when no dataset has it. Geometries without
    /// statistical coverage legitimately resolve to `None`.
    pub fn resolve(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(c, e)| (c.as_str(), e.as_str()))
    }

    /// Builds an `entity` column for a column of codes.
    pub fn entity_series(&self, codes: &Series) -> PolarsResult<Series> {
        let codes = codes.cast(&DataType::String)?;
        let entities: Vec<Option<&str>> = codes
            .str()?
            .into_iter()
            .map(|code| code.and_then(|c| self.resolve(c)))
            .collect();
        Ok(Series::new(COL::ENTITY, entities))
    }
}
