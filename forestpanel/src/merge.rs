//! Progressive full outer join of the cleaned datasets into one `(code, year)` panel.

use std::collections::HashSet;

use itertools::Itertools;
use log::{debug, info, warn};
use nonempty::NonEmpty;
use polars::prelude::*;

use crate::disambiguate::CleanedDataset;
use crate::error::{ForestPanelError, ForestPanelResult};
use crate::registry::EntityRegistry;
use crate::COL;

fn join_keys() -> [Expr; 2] {
    [col(COL::CODE), col(COL::YEAR)]
}

/// Outer joins `datasets` in order on `(code, year)`, restores `entity` from `registry` and
/// returns the panel ordered by `(entity, year)`.
///
/// Every key seen in any dataset yields exactly one row; measurements a dataset lacks for that
/// key are null. Measurement columns are kept even when entirely null, see
/// [`prune_empty_value_columns`] for dropping them.
pub fn merge_datasets(
    datasets: &NonEmpty<CleanedDataset>,
    registry: &EntityRegistry,
) -> ForestPanelResult<DataFrame> {
    let mut seen: HashSet<&str> = HashSet::from(COL::KEY_COLUMNS);
    let mut value_columns: Vec<&str> = vec![];
    for dataset in datasets.iter() {
        for column in dataset.value_columns() {
            if !seen.insert(column) {
                return Err(ForestPanelError::DuplicateColumn {
                    table: dataset.name.clone(),
                    column: column.into(),
                });
            }
            value_columns.push(column);
        }
    }

    let mut merged = datasets.head.data.clone().lazy();
    for dataset in datasets.tail.iter() {
        debug!("Joining {} ({} rows)", dataset.name, dataset.data.height());
        merged = merged.join(
            dataset.data.clone().lazy(),
            join_keys(),
            join_keys(),
            JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
        );
    }
    let mut merged = merged.collect()?;

    let entities = registry.entity_series(merged.column(COL::CODE)?)?;
    merged.with_column(entities)?;

    let order = COL::KEY_COLUMNS
        .into_iter()
        .chain(value_columns.iter().copied())
        .collect_vec();
    let panel = merged.select(order)?.sort(
        [COL::ENTITY, COL::YEAR, COL::CODE],
        SortMultipleOptions::default()
            .with_nulls_last(true)
            .with_maintain_order(true),
    )?;

    for column in empty_value_columns(&panel) {
        warn!("Panel column '{column}' has no values");
    }
    info!("Merged panel with shape: {:?}", panel.shape());
    Ok(panel)
}

/// Measurement columns of `df` that hold no values at all.
pub fn empty_value_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|s| !COL::KEY_COLUMNS.contains(&s.name()))
        .filter(|s| s.null_count() == s.len())
        .map(|s| s.name().to_string())
        .collect()
}

/// Drops measurement columns that hold no values. This is a projection over the merged panel,
/// the merge itself never drops columns.
pub fn prune_empty_value_columns(df: &DataFrame) -> ForestPanelResult<DataFrame> {
    let empty = empty_value_columns(df);
    if !empty.is_empty() {
        info!("Pruning empty panel columns: {empty:?}");
    }
    Ok(df.drop_many(&empty))
}

#[cfg(test)]
mod tests {
    use nonempty::nonempty;

    use super::*;
    use crate::disambiguate::disambiguate;

    fn dataset(name: &str, df: DataFrame) -> CleanedDataset {
        disambiguate(name, df).unwrap()
    }

    fn portugal_a() -> DataFrame {
        df!(
            COL::ENTITY => &["Portugal", "Portugal", "France"],
            COL::CODE => &["PRT", "PRT", "FRA"],
            COL::YEAR => &[2020i64, 2021, 2020],
            "value" => &[10.0, 11.0, 20.0],
        )
        .unwrap()
    }

    fn portugal_b() -> DataFrame {
        df!(
            COL::ENTITY => &["Portugal", "Norway"],
            COL::CODE => &["PRT", "NOR"],
            COL::YEAR => &[2020i64, 2019],
            "red_list" => &[0.8, 0.9],
        )
        .unwrap()
    }

    fn registry(frames: &[&DataFrame]) -> EntityRegistry {
        EntityRegistry::build(frames.iter().map(|df| ("t", *df))).unwrap()
    }

    fn row_for(panel: &DataFrame, code: &str, year: i64) -> anyhow::Result<DataFrame> {
        Ok(panel
            .clone()
            .lazy()
            .filter(col(COL::CODE).eq(lit(code)).and(col(COL::YEAR).eq(lit(year))))
            .collect()?)
    }

    #[test]
    fn shared_key_is_merged_into_one_row() -> anyhow::Result<()> {
        let (a, b) = (portugal_a(), portugal_b());
        let registry = registry(&[&a, &b]);
        let panel = merge_datasets(&nonempty![dataset("a", a), dataset("b", b)], &registry)?;

        let row = row_for(&panel, "PRT", 2020)?;
        assert_eq!(row.height(), 1);
        assert_eq!(row.column(COL::ENTITY)?.str()?.get(0), Some("Portugal"));
        assert_eq!(row.column("a")?.f64()?.get(0), Some(10.0));
        assert_eq!(row.column("b")?.f64()?.get(0), Some(0.8));
        Ok(())
    }

    #[test]
    fn keys_from_any_dataset_survive() -> anyhow::Result<()> {
        let (a, b) = (portugal_a(), portugal_b());
        let registry = registry(&[&a, &b]);
        let panel = merge_datasets(&nonempty![dataset("a", a), dataset("b", b)], &registry)?;

        // PRT 2020, PRT 2021, FRA 2020, NOR 2019
        assert_eq!(panel.height(), 4);
        let norway = row_for(&panel, "NOR", 2019)?;
        assert_eq!(norway.height(), 1);
        assert_eq!(norway.column("a")?.f64()?.get(0), None);
        assert_eq!(norway.column("b")?.f64()?.get(0), Some(0.9));
        assert_eq!(norway.column(COL::ENTITY)?.str()?.get(0), Some("Norway"));
        Ok(())
    }

    #[test]
    fn columns_and_rows_are_ordered() -> anyhow::Result<()> {
        let (a, b) = (portugal_a(), portugal_b());
        let registry = registry(&[&a, &b]);
        let panel = merge_datasets(&nonempty![dataset("a", a), dataset("b", b)], &registry)?;

        assert_eq!(
            panel
                .get_column_names()
                .iter()
                .map(|c| c.to_string())
                .collect_vec(),
            vec!["entity", "code", "year", "a", "b"]
        );
        assert_eq!(
            panel.column(COL::ENTITY)?.str()?.into_iter().collect_vec(),
            vec![
                Some("France"),
                Some("Norway"),
                Some("Portugal"),
                Some("Portugal")
            ]
        );
        assert_eq!(
            panel.column(COL::YEAR)?.i64()?.into_iter().collect_vec(),
            vec![Some(2020), Some(2019), Some(2020), Some(2021)]
        );
        Ok(())
    }

    #[test]
    fn rows_without_a_year_never_multiply_keys() -> anyhow::Result<()> {
        let undated = |value: f64| {
            df!(
                COL::ENTITY => &["Portugal", "Portugal"],
                COL::CODE => &["PRT", "PRT"],
                COL::YEAR => &[None, Some(2020i64)],
                "value" => &[value, value],
            )
        };
        let (a, b) = (undated(1.0)?, undated(2.0)?);
        let registry = registry(&[&a, &b]);
        let panel = merge_datasets(&nonempty![dataset("a", a), dataset("b", b)], &registry)?;
        assert_eq!(panel.shape(), (1, 5));
        assert_eq!(panel.column(COL::YEAR)?.i64()?.get(0), Some(2020));
        Ok(())
    }

    #[test]
    fn merging_is_deterministic() -> anyhow::Result<()> {
        let (a, b) = (portugal_a(), portugal_b());
        let registry = registry(&[&a, &b]);
        let datasets = nonempty![dataset("a", a), dataset("b", b)];
        let first = merge_datasets(&datasets, &registry)?;
        let second = merge_datasets(&datasets, &registry)?;
        assert!(first.equals_missing(&second));
        Ok(())
    }

    #[test]
    fn single_dataset_is_its_own_panel() -> anyhow::Result<()> {
        let a = portugal_a();
        let registry = registry(&[&a]);
        let panel = merge_datasets(&nonempty![dataset("a", a)], &registry)?;
        assert_eq!(panel.shape(), (3, 4));
        Ok(())
    }

    #[test]
    fn empty_columns_are_retained_until_pruned() -> anyhow::Result<()> {
        let a = portugal_a();
        let annotated = df!(
            COL::ENTITY => &["Portugal"],
            COL::CODE => &["PRT"],
            COL::YEAR => &[2020i64],
            "share" => &[40.1],
            "annotations" => &[None::<&str>],
        )?;
        let registry = registry(&[&a, &annotated]);
        let panel = merge_datasets(
            &nonempty![dataset("a", a), dataset("share", annotated)],
            &registry,
        )?;
        assert!(panel.column("share_2").is_ok());
        assert_eq!(empty_value_columns(&panel), vec!["share_2"]);

        let pruned = prune_empty_value_columns(&panel)?;
        assert!(pruned.column("share_2").is_err());
        assert!(pruned.column("share_1").is_ok());
        assert_eq!(pruned.height(), panel.height());
        Ok(())
    }

    #[test]
    fn colliding_panel_columns_are_rejected() -> anyhow::Result<()> {
        let (a, b) = (portugal_a(), portugal_b());
        let registry = registry(&[&a, &b]);
        let result = merge_datasets(&nonempty![dataset("a", a), dataset("a", b)], &registry);
        assert!(matches!(
            result,
            Err(ForestPanelError::DuplicateColumn { ref column, .. }) if column == "a"
        ));
        Ok(())
    }
}
