//! Canonicalise the column names of a freshly loaded dataset.
//!
//! Publishers disagree on casing and padding (`Entity`, ` Code`, `YEAR`), so every column name
//! is trimmed and lower-cased. Key columns then line up with [`COL::KEY_COLUMNS`] while
//! measurement columns keep their (folded) short names until the disambiguation step.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::debug;
use polars::prelude::*;

use crate::error::{ForestPanelError, ForestPanelResult};
use crate::COL;

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Maps each canonical key column onto the source column that provides it.
///
/// Two source columns folding onto the same key (e.g. `Code` and `code `) cannot be told apart
/// and are rejected. Keys with no source column are simply absent from the mapping.
pub fn key_column_mapping(
    table: &str,
    columns: &[String],
) -> ForestPanelResult<BTreeMap<&'static str, String>> {
    let mut mapping = BTreeMap::new();
    for key in COL::KEY_COLUMNS {
        let candidates = columns
            .iter()
            .filter(|c| fold(c) == key)
            .cloned()
            .collect_vec();
        match candidates.len() {
            0 => {}
            1 => {
                mapping.insert(key, candidates[0].clone());
            }
            _ => {
                return Err(ForestPanelError::AmbiguousColumn {
                    table: table.into(),
                    column: key.into(),
                    candidates,
                })
            }
        }
    }
    Ok(mapping)
}

/// Returns the folded name for every column, failing if two columns would collide.
pub fn normalized_column_names(table: &str, columns: &[String]) -> ForestPanelResult<Vec<String>> {
    // Key collisions get the more specific error
    key_column_mapping(table, columns)?;
    let folded = columns.iter().map(|c| fold(c)).collect_vec();
    if let Some(duplicate) = folded.iter().duplicates().next() {
        return Err(ForestPanelError::AmbiguousColumn {
            table: table.into(),
            column: duplicate.clone(),
            candidates: columns
                .iter()
                .filter(|c| &fold(c) == duplicate)
                .cloned()
                .collect(),
        });
    }
    Ok(folded)
}

/// Fails with [`ForestPanelError::MissingColumn`] unless every one of `columns` is present.
pub fn require_columns(table: &str, df: &DataFrame, columns: &[&str]) -> ForestPanelResult<()> {
    match columns.iter().find(|c| df.get_column_index(c).is_none()) {
        Some(missing) => Err(ForestPanelError::MissingColumn {
            table: table.into(),
            column: missing.to_string(),
        }),
        None => Ok(()),
    }
}

/// Casts a key column to strings with surrounding whitespace removed. Codes arrive as strings,
/// integers or nulls depending on the source.
pub(crate) fn trimmed_key(series: &Series) -> PolarsResult<Series> {
    let values = series.cast(&DataType::String)?;
    let trimmed: Vec<Option<String>> = values
        .str()?
        .into_iter()
        .map(|value| value.map(|v| v.trim().to_string()))
        .collect();
    Ok(Series::new(series.name(), trimmed))
}

/// Renames the columns of `df` to their canonical form.
pub fn normalize(table: &str, mut df: DataFrame) -> ForestPanelResult<DataFrame> {
    let columns = df
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect_vec();
    let names = normalized_column_names(table, &columns)?;
    debug!("[{table}] columns {columns:?} normalised to {names:?}");
    df.set_column_names(&names)?;
    Ok(df)
}

/// Renames the column named `code_key` (after folding) to [`COL::CODE`], for sources that
/// publish the country code under another name such as `iso_code`.
pub fn rename_code_column(
    table: &str,
    mut df: DataFrame,
    code_key: &str,
) -> ForestPanelResult<DataFrame> {
    let code_key = fold(code_key);
    if code_key == COL::CODE || df.get_column_index(&code_key).is_none() {
        return Ok(df);
    }
    if df.get_column_index(COL::CODE).is_some() {
        return Err(ForestPanelError::AmbiguousColumn {
            table: table.into(),
            column: COL::CODE.into(),
            candidates: vec![COL::CODE.into(), code_key],
        });
    }
    debug!("[{table}] using '{code_key}' as {}", COL::CODE);
    df.rename(&code_key, COL::CODE)?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn key_columns_are_recognised_case_insensitively() -> anyhow::Result<()> {
        let mapping = key_column_mapping("t", &names(&["Entity", " CODE ", "Year", "Value"]))?;
        assert_eq!(mapping[COL::ENTITY], "Entity");
        assert_eq!(mapping[COL::CODE], " CODE ");
        assert_eq!(mapping[COL::YEAR], "Year");
        assert_eq!(mapping.len(), 3);
        Ok(())
    }

    #[test]
    fn missing_keys_are_not_an_error_here() -> anyhow::Result<()> {
        let mapping = key_column_mapping("t", &names(&["Entity", "Year", "value"]))?;
        assert!(!mapping.contains_key(COL::CODE));
        Ok(())
    }

    #[test]
    fn ambiguous_key_columns_are_rejected() {
        let result = key_column_mapping("t", &names(&["Code", "code ", "year"]));
        assert!(matches!(
            result,
            Err(ForestPanelError::AmbiguousColumn { ref column, .. }) if column == COL::CODE
        ));
    }

    #[test]
    fn measurement_names_are_folded_but_kept() -> anyhow::Result<()> {
        let df = df!(
            "Entity" => &["Brazil"],
            "Code" => &["BRA"],
            "Year" => &[2020i64],
            " Forest_Share " => &[59.4],
        )?;
        let df = normalize("forest_share", df)?;
        assert_eq!(
            df.get_column_names()
                .iter()
                .map(|c| c.to_string())
                .collect_vec(),
            vec!["entity", "code", "year", "forest_share"]
        );
        Ok(())
    }

    #[test]
    fn configured_code_column_becomes_code() -> anyhow::Result<()> {
        let df = normalize(
            "t",
            df!("Entity" => &["Brazil"], "ISO_Code" => &["BRA"], "Year" => &[2020i64])?,
        )?;
        let df = rename_code_column("t", df, "iso_code")?;
        assert_eq!(df.column(COL::CODE)?.str()?.get(0), Some("BRA"));
        assert!(df.column("iso_code").is_err());

        // The default key and absent columns leave the frame alone
        let df = rename_code_column("t", df, COL::CODE)?;
        let df = rename_code_column("t", df, "country_code")?;
        assert!(df.column(COL::CODE).is_ok());
        Ok(())
    }

    #[test]
    fn configured_code_column_cannot_shadow_code() -> anyhow::Result<()> {
        let df = df!("code" => &["BRA"], "iso_code" => &["BRA"])?;
        assert!(matches!(
            rename_code_column("t", df, "iso_code"),
            Err(ForestPanelError::AmbiguousColumn { ref column, .. }) if column == COL::CODE
        ));
        Ok(())
    }

    #[test]
    fn required_columns_are_checked() -> anyhow::Result<()> {
        let df = df!("entity" => &["Brazil"], "year" => &[2020i64])?;
        let result = require_columns("t", &df, &COL::KEY_COLUMNS);
        assert!(matches!(
            result,
            Err(ForestPanelError::MissingColumn { ref column, .. }) if column == COL::CODE
        ));
        assert!(require_columns("t", &df, &[COL::ENTITY, COL::YEAR]).is_ok());
        Ok(())
    }

    #[test]
    fn keys_are_trimmed_strings() -> anyhow::Result<()> {
        let codes = Series::new("ISO_A3", &[Some(" FRA "), None, Some("-99")]);
        let trimmed = trimmed_key(&codes)?;
        assert_eq!(trimmed.name(), "ISO_A3");
        assert_eq!(
            trimmed.str()?.into_iter().collect_vec(),
            vec![Some("FRA"), None, Some("-99")]
        );

        let numeric = Series::new("ISO_A3", &[-99i64, 4]);
        let trimmed = trimmed_key(&numeric)?;
        assert_eq!(
            trimmed.str()?.into_iter().collect_vec(),
            vec![Some("-99"), Some("4")]
        );
        Ok(())
    }

    #[test]
    fn colliding_measurement_names_are_rejected() -> anyhow::Result<()> {
        let df = df!(
            "Entity" => &["Brazil"],
            "Code" => &["BRA"],
            "Year" => &[2020i64],
            "Value" => &[1.0],
            "value" => &[2.0],
        )?;
        assert!(matches!(
            normalize("t", df),
            Err(ForestPanelError::AmbiguousColumn { ref column, .. }) if column == "value"
        ));
        Ok(())
    }
}
