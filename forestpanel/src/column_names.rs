//! This module stores the canonical column names used throughout the pipeline. Source datasets
//! are normalised onto these names, and the merged panel and geo-joined table are built from
//! them. Note that the geometry-side names must be synchronised with the boundary file in use!

pub const ENTITY: &str = "entity";
pub const CODE: &str = "code";
pub const YEAR: &str = "year";

/// Columns that identify an observation. Everything else in a dataset is a measurement.
pub const KEY_COLUMNS: [&str; 3] = [ENTITY, CODE, YEAR];

pub const GEO_NAME: &str = "NAME";
pub const GEO_ISO_A3: &str = "ISO_A3";
pub const GEOMETRY: &str = "geometry";
