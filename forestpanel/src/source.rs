//! Local source files: one CSV per dataset.

use std::io::Cursor;
use std::path::Path;

use anyhow::Context;
use log::info;
use polars::prelude::*;

/// A dataset as published, before any harmonisation.
#[derive(Debug, Clone)]
pub struct RawDataset {
    pub name: String,
    pub data: DataFrame,
}

impl RawDataset {
    pub fn new(name: &str, data: DataFrame) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Parses CSV bytes with a header row. Column types are inferred.
pub fn read_dataset_csv_from_bytes(name: &str, bytes: Vec<u8>) -> anyhow::Result<RawDataset> {
    let data = CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .with_context(|| format!("Failed to parse CSV for dataset '{name}'"))?;
    Ok(RawDataset::new(name, data))
}

pub fn read_dataset_csv<P: AsRef<Path>>(name: &str, path: P) -> anyhow::Result<RawDataset> {
    let path = path.as_ref();
    info!("Reading dataset '{name}' from {}", path.display());
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read dataset '{name}' from '{}'", path.display()))?;
    let dataset = read_dataset_csv_from_bytes(name, bytes)?;
    info!("Dataset '{name}' has shape {:?}", dataset.data.shape());
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const CSV: &str = "Entity,Code,Year,deforestation
World,,2020,10200000
Portugal,PRT,2020,12000
\"Bonaire, Sint Eustatius and Saba\",BES,2020,
";

    #[test]
    fn parses_csv_with_blank_codes() -> anyhow::Result<()> {
        let dataset = read_dataset_csv_from_bytes("annual_deforestation", CSV.into())?;
        assert_eq!(dataset.name, "annual_deforestation");
        assert_eq!(dataset.data.shape(), (3, 4));
        assert_eq!(dataset.data.column("Code")?.null_count(), 1);
        assert_eq!(dataset.data.column("deforestation")?.null_count(), 1);
        assert_eq!(
            dataset.data.column("Entity")?.str()?.get(2),
            Some("Bonaire, Sint Eustatius and Saba")
        );
        Ok(())
    }

    #[test]
    fn reads_from_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(CSV.as_bytes())?;
        let dataset = read_dataset_csv("annual_deforestation", file.path())?;
        assert_eq!(dataset.data.height(), 3);
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = read_dataset_csv("annual_deforestation", "missing.csv").unwrap_err();
        assert!(err.to_string().contains("annual_deforestation"));
    }
}
