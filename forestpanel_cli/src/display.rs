use comfy_table::{presets::NOTHING, *};
use forestpanel::{ForestPanel, COL};
use itertools::Itertools;
use polars::prelude::{AnyValue, DataFrame};
use serde::Serialize;

/// One configured dataset as shown by the `datasets` command.
#[derive(Serialize, Debug, PartialEq)]
pub struct DatasetSummary {
    pub name: String,
    pub title: Option<String>,
    pub panel_columns: Vec<String>,
}

pub fn dataset_summaries(forest_panel: &ForestPanel) -> Vec<DatasetSummary> {
    forest_panel
        .dataset_names()
        .into_iter()
        .map(|name| DatasetSummary {
            name: name.to_string(),
            title: forest_panel
                .metadata(name)
                .map(|metadata| metadata.chart.title.clone())
                .filter(|title| !title.is_empty()),
            panel_columns: forest_panel
                .origins()
                .iter()
                .filter(|origin| origin.dataset == name)
                .map(|origin| origin.panel_column.clone())
                .collect(),
        })
        .collect()
}

fn styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    table
}

pub fn display_datasets(summaries: &[DatasetSummary]) {
    let mut table = styled_table();
    table.set_header(vec![
        Cell::new("Dataset").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Panel columns").add_attribute(Attribute::Bold),
    ]);
    for summary in summaries {
        table.add_row(vec![
            summary.name.clone(),
            summary.title.clone().unwrap_or_default(),
            summary.panel_columns.join(", "),
        ]);
    }
    println!("\n{}", table);
}

fn cell_text(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => String::new(),
        other => other
            .get_str()
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

/// Renders `df` as a table. Geometries are left out since WKT does not fit in a terminal.
pub fn display_rows(df: &DataFrame) -> anyhow::Result<()> {
    let df = match df.get_column_index(COL::GEOMETRY) {
        Some(_) => df.drop(COL::GEOMETRY)?,
        None => df.clone(),
    };
    let mut table = styled_table();
    table.set_header(
        df.get_column_names()
            .into_iter()
            .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
            .collect_vec(),
    );
    for idx in 0..df.height() {
        let row = df
            .get_columns()
            .iter()
            .map(|column| column.get(idx).map(|value| cell_text(&value)))
            .collect::<Result<Vec<_>, _>>()?;
        table.add_row(row);
    }
    println!("\n{}", table);
    Ok(())
}
