//! Country geometries: loading them from GeoJSON and joining them to the merged panel.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context};
use geojson::{FeatureCollection, GeoJson};
use itertools::{izip, Itertools};
use log::{debug, info, warn};
use polars::prelude::*;
use serde_json::Value;
use wkt::ToWkt;

use crate::config::Config;
use crate::error::ForestPanelResult;
use crate::normalize::{require_columns, trimmed_key};
use crate::COL;

const GEOMETRY_TABLE: &str = "geometries";
const PANEL_TABLE: &str = "panel";

fn property_as_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Parses a GeoJSON feature collection into a frame of `name_key`, `code_key` and WKT
/// `geometry` columns. Codes stored as numbers are kept as their string form.
pub fn geometries_from_geojson(
    contents: &str,
    name_key: &str,
    code_key: &str,
) -> anyhow::Result<DataFrame> {
    let geojson: GeoJson = contents.parse()?;
    let collection = FeatureCollection::try_from(geojson)?;

    let mut names: Vec<Option<String>> = vec![];
    let mut codes: Vec<Option<String>> = vec![];
    let mut geoms: Vec<Option<String>> = vec![];
    for feature in collection.features {
        names.push(property_as_string(feature.property(name_key)));
        codes.push(property_as_string(feature.property(code_key)));
        let wkt = match feature.geometry {
            Some(geometry) => {
                let geom = ::geo::Geometry::<f64>::try_from(geometry)
                    .map_err(|err| anyhow!("Unsupported geometry: {err}"))?;
                Some(geom.wkt_string())
            }
            None => None,
        };
        geoms.push(wkt);
    }

    Ok(DataFrame::new(vec![
        Series::new(name_key, names),
        Series::new(code_key, codes),
        Series::new(COL::GEOMETRY, geoms),
    ])?)
}

/// Reads the country boundary file at `path`.
pub fn read_geometries<P: AsRef<Path>>(
    path: P,
    name_key: &str,
    code_key: &str,
) -> anyhow::Result<DataFrame> {
    let path = path.as_ref();
    info!("Reading geometries from {}", path.display());
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read geometries from '{}'", path.display()))?;
    let df = geometries_from_geojson(&contents, name_key, code_key)
        .with_context(|| format!("Failed to parse geometries in '{}'", path.display()))?;
    info!("Loaded {} geometries", df.height());
    Ok(df)
}

/// Joins geometry records to the panel on country code.
#[derive(Debug, Clone)]
pub struct GeoJoin {
    pub geo_key: String,
    pub geo_name_key: String,
    pub iso_overrides: BTreeMap<String, String>,
    pub sentinel_codes: Vec<String>,
    pub year: Option<i64>,
}

impl From<&Config> for GeoJoin {
    fn from(config: &Config) -> Self {
        Self {
            geo_key: config.geo_key.clone(),
            geo_name_key: config.geo_name_key.clone(),
            iso_overrides: config.iso_overrides.clone(),
            sentinel_codes: config.sentinel_codes.clone(),
            year: config.year,
        }
    }
}

impl GeoJoin {
    /// Keeps the name, code and geometry columns, applies the name overrides and blanks any
    /// code still equal to a sentinel so it cannot match.
    pub fn correct_codes(&self, geometries: &DataFrame) -> ForestPanelResult<DataFrame> {
        let columns = [
            self.geo_name_key.as_str(),
            self.geo_key.as_str(),
            COL::GEOMETRY,
        ];
        require_columns(GEOMETRY_TABLE, geometries, &columns)?;
        let mut df = geometries.select(columns)?;

        let names = df.column(&self.geo_name_key)?.cast(&DataType::String)?;
        let codes = trimmed_key(df.column(&self.geo_key)?)?;
        let corrected: Vec<Option<String>> = izip!(names.str()?, codes.str()?)
            .map(|(name, code)| {
                name.and_then(|name| self.iso_overrides.get(name.trim()))
                    .map(String::as_str)
                    .or(code)
                    .filter(|code| !self.sentinel_codes.iter().any(|s| s.as_str() == *code))
                    .map(str::to_string)
            })
            .collect();

        let unmatched = izip!(names.str()?, corrected.iter())
            .filter(|(_, code)| code.is_none())
            .map(|(name, _)| name.unwrap_or_default())
            .collect_vec();
        if !unmatched.is_empty() {
            warn!("Geometries without a usable code: {unmatched:?}");
        }

        df.with_column(Series::new(&self.geo_key, corrected))?;
        Ok(df)
    }

    /// Trims the panel's code column, applies the year filter and keeps one row per code (the
    /// last, i.e. latest, in panel order) so the join cannot multiply geometry rows.
    pub fn prepare_panel(&self, panel: &DataFrame) -> ForestPanelResult<DataFrame> {
        require_columns(PANEL_TABLE, panel, &[COL::CODE, COL::YEAR])?;
        let mut panel = panel.clone();
        let codes = trimmed_key(panel.column(COL::CODE)?)?;
        panel.with_column(codes)?;

        let filtered = match self.year {
            Some(year) => panel
                .lazy()
                .filter(col(COL::YEAR).eq(lit(year)))
                .collect()?,
            None => panel,
        };
        let unique = filtered
            .clone()
            .lazy()
            .unique_stable(Some(vec![COL::CODE.to_string()]), UniqueKeepStrategy::Last)
            .collect()?;
        if unique.height() < filtered.height() {
            info!(
                "Panel reduced from {} to {} rows, one per code, for the geo join",
                filtered.height(),
                unique.height()
            );
        }
        Ok(unique)
    }

    /// Left joins the geometries to the panel. Every geometry row survives exactly once; rows
    /// without statistics carry nulls in every panel column.
    pub fn join(&self, geometries: &DataFrame, panel: &DataFrame) -> ForestPanelResult<DataFrame> {
        let geometries = self.correct_codes(geometries)?;
        let panel = self.prepare_panel(panel)?;
        debug!(
            "Geo join on {} = {} with {} geometries and {} panel rows",
            self.geo_key,
            COL::CODE,
            geometries.height(),
            panel.height()
        );

        let mut joined = geometries
            .lazy()
            .join(
                panel.clone().lazy(),
                [col(&self.geo_key)],
                [col(COL::CODE)],
                JoinArgs::new(JoinType::Left).with_coalesce(JoinCoalesce::CoalesceColumns),
            )
            .collect()?;
        if self.geo_key != COL::CODE && joined.get_column_index(COL::CODE).is_some() {
            joined = joined.drop(COL::CODE)?;
        }

        let order = [self.geo_name_key.as_str(), self.geo_key.as_str()]
            .into_iter()
            .chain(
                panel
                    .get_column_names()
                    .into_iter()
                    .filter(|c| *c != COL::CODE),
            )
            .chain([COL::GEOMETRY])
            .map(|c| c.to_string())
            .collect_vec();
        let joined = joined.select(order)?;
        info!("Geo joined table with shape: {:?}", joined.shape());
        Ok(joined)
    }
}
