//! Removal of rows describing aggregates (continents, income groups, the world) rather than
//! individual countries.

use log::info;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ForestPanelError, ForestPanelResult};
use crate::normalize::trimmed_key;
use crate::COL;

/// Which rows count as aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AggregatePolicy {
    /// Only rows without a code.
    MissingCode,
    /// Rows without a code, plus synthetic codes such as `OWID_WRL` that contain the separator.
    /// ISO 3166-1 alpha-3 codes never do.
    #[default]
    MissingOrCompoundCode,
}

#[derive(Debug, Clone, Copy)]
pub struct AggregateFilter {
    pub policy: AggregatePolicy,
    pub separator: char,
}

impl Default for AggregateFilter {
    fn default() -> Self {
        Self {
            policy: AggregatePolicy::default(),
            separator: '_',
        }
    }
}

impl AggregateFilter {
    pub fn new(policy: AggregatePolicy, separator: char) -> Self {
        Self { policy, separator }
    }

    /// Whether a (trimmed) code identifies a single country.
    pub fn is_country_code(&self, code: Option<&str>) -> bool {
        match code {
            None => false,
            Some(code) if code.trim().is_empty() => false,
            Some(code) => match self.policy {
                AggregatePolicy::MissingCode => true,
                AggregatePolicy::MissingOrCompoundCode => !code.contains(self.separator),
            },
        }
    }

    /// Drops aggregate rows from `df` and leaves `code` as a trimmed string column.
    ///
    /// Requires a normalised `code` column. Applying the filter to its own output is a no-op.
    pub fn apply(&self, table: &str, mut df: DataFrame) -> ForestPanelResult<DataFrame> {
        let codes = df
            .column(COL::CODE)
            .map_err(|_| ForestPanelError::MissingColumn {
                table: table.into(),
                column: COL::CODE.into(),
            })?;
        let codes = trimmed_key(codes)?;
        let mask: BooleanChunked = codes
            .str()?
            .into_iter()
            .map(|code| self.is_country_code(code))
            .collect();
        df.with_column(codes)?;
        let filtered = df.filter(&mask)?;
        info!(
            "[{table}] {} of {} rows kept after dropping aggregates",
            filtered.height(),
            df.height()
        );
        Ok(filtered)
    }
}
