//! Renaming of measurement columns so that datasets can be joined without collisions.

use itertools::Itertools;
use log::{debug, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ForestPanelResult;
use crate::normalize::require_columns;
use crate::COL;

/// Where a panel column came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOrigin {
    pub dataset: String,
    pub source_column: String,
    pub panel_column: String,
}

/// A dataset reduced to `code`, `year` and its renamed measurement columns.
#[derive(Debug, Clone)]
pub struct CleanedDataset {
    pub name: String,
    pub data: DataFrame,
    pub origins: Vec<ColumnOrigin>,
}

impl CleanedDataset {
    pub fn value_columns(&self) -> Vec<&str> {
        self.origins
            .iter()
            .map(|o| o.panel_column.as_str())
            .collect()
    }
}

/// Every column that is not a key column, in source order.
pub fn value_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|c| c.to_string())
        .filter(|c| !COL::KEY_COLUMNS.contains(&c.as_str()))
        .collect()
}

/// Panel names for a dataset's measurement columns: a single column takes the dataset name,
/// several are numbered `<name>_1`, `<name>_2`, ... in source order.
pub fn panel_column_names(dataset: &str, value_columns: &[String]) -> Vec<String> {
    match value_columns {
        [_] => vec![dataset.to_string()],
        columns => (1..=columns.len())
            .map(|ordinal| format!("{dataset}_{ordinal}"))
            .collect(),
    }
}

/// Renames measurement columns, drops `entity` and collapses repeated `(code, year)` rows
/// keeping the last one. Rows without a usable year have no key to join on and are dropped.
pub fn disambiguate(dataset: &str, df: DataFrame) -> ForestPanelResult<CleanedDataset> {
    require_columns(dataset, &df, &COL::KEY_COLUMNS)?;
    let sources = value_columns(&df);
    let origins = sources
        .iter()
        .zip(panel_column_names(dataset, &sources))
        .map(|(source, panel)| ColumnOrigin {
            dataset: dataset.into(),
            source_column: source.clone(),
            panel_column: panel,
        })
        .collect_vec();
    debug!("[{dataset}] column origins: {origins:?}");

    let selection = [
        col(COL::CODE),
        col(COL::YEAR).cast(DataType::Int64),
    ]
    .into_iter()
    .chain(
        origins
            .iter()
            .map(|o| col(&o.source_column).alias(&o.panel_column)),
    )
    .collect_vec();

    let rows = df.height();
    let keyed = df
        .lazy()
        .select(selection)
        .filter(col(COL::YEAR).is_not_null())
        .collect()?;
    if keyed.height() < rows {
        warn!(
            "[{dataset}] dropped {} rows without a year",
            rows - keyed.height()
        );
    }

    let data = keyed
        .lazy()
        .unique_stable(
            Some(vec![COL::CODE.to_string(), COL::YEAR.to_string()]),
            UniqueKeepStrategy::Last,
        )
        .collect()?;

    Ok(CleanedDataset {
        name: dataset.into(),
        data,
        origins,
    })
}
