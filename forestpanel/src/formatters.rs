//! Serialisers for the joined table: GeoJSON, GeoJSON text sequences and CSV.

use std::fmt::Write as FmtWrite;
use std::io::{Cursor, Write};

use anyhow::{anyhow, Result};
use enum_dispatch::enum_dispatch;
use geo::geometry::Geometry;
use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wkb::geom_to_wkb;
use wkt::TryFromWkt;

use crate::COL;

fn parse_wkt(wkt: &str) -> Result<Geometry<f64>> {
    Geometry::try_from_wkt_str(wkt).map_err(|err| anyhow!("Invalid WKT geometry '{wkt}': {err}"))
}

/// Re-encodes a WKT geometry column as hex WKB. Nulls stay null.
fn wkt_to_wkb_hex(s: &Series) -> Result<Series> {
    let encoded = s
        .str()?
        .into_iter()
        .map(|wkt| {
            wkt.map(|wkt| -> Result<String> {
                let wkb = geom_to_wkb(&parse_wkt(wkt)?)
                    .map_err(|err| anyhow!("Failed to encode geometry as WKB: {err:?}"))?;
                Ok(wkb.iter().fold(String::new(), |mut acc, byte| {
                    let _ = write!(acc, "{byte:02X}");
                    acc
                }))
            })
            .transpose()
        })
        .collect::<Result<Vec<Option<String>>>>()?;
    Ok(Series::new(s.name(), encoded))
}

fn any_value_to_json(value: &AnyValue) -> Result<Value> {
    match value {
        AnyValue::Null => Ok(Value::Null),
        AnyValue::Boolean(b) => Ok(Value::Bool(*b)),
        AnyValue::String(s) => Ok(Value::String((*s).to_string())),
        AnyValue::StringOwned(s) => Ok(Value::String(s.to_string())),
        AnyValue::Int8(n) => Ok(json!(*n)),
        AnyValue::Int16(n) => Ok(json!(*n)),
        AnyValue::Int32(n) => Ok(json!(*n)),
        AnyValue::Int64(n) => Ok(json!(*n)),
        AnyValue::UInt8(n) => Ok(json!(*n)),
        AnyValue::UInt16(n) => Ok(json!(*n)),
        AnyValue::UInt32(n) => Ok(json!(*n)),
        AnyValue::UInt64(n) => Ok(json!(*n)),
        AnyValue::Float32(n) => Ok(json!(*n)),
        AnyValue::Float64(n) => Ok(json!(*n)),
        other => Err(anyhow!("Cannot represent {other:?} as a GeoJSON property")),
    }
}

/// One feature per row; every column except `geometry` becomes a property. Rows without a
/// geometry are written with a null geometry.
fn features(df: &DataFrame) -> Result<Vec<geojson::Feature>> {
    let geometries = df.column(COL::GEOMETRY)?.str()?;
    let properties = df.drop(COL::GEOMETRY)?;
    let mut features = Vec::with_capacity(df.height());
    for (idx, wkt) in geometries.into_iter().enumerate() {
        let geometry = wkt
            .map(|wkt| parse_wkt(wkt).map(|geom| geojson::Geometry::from(&geom)))
            .transpose()?;
        let mut map = serde_json::Map::new();
        for column in properties.get_columns() {
            map.insert(column.name().to_string(), any_value_to_json(&column.get(idx)?)?);
        }
        features.push(geojson::Feature {
            bbox: None,
            geometry,
            id: None,
            properties: Some(map),
            foreign_members: None,
        });
    }
    debug!(
        "Built {} features, {} without geometry",
        features.len(),
        geometries.null_count()
    );
    Ok(features)
}

/// Writes a table in some serialised form.
#[enum_dispatch]
pub trait OutputGenerator {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()>;
    fn format(&self, df: &mut DataFrame) -> Result<String> {
        let mut data: Vec<u8> = vec![];
        self.save(&mut Cursor::new(&mut data), df)?;
        Ok(String::from_utf8(data)?)
    }
}

#[enum_dispatch(OutputGenerator)]
#[derive(Serialize, Deserialize, Debug)]
pub enum OutputFormatter {
    GeoJSON(GeoJSONFormatter),
    GeoJSONSeq(GeoJSONSeqFormatter),
    Csv(CSVFormatter),
}

/// A single GeoJSON FeatureCollection.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct GeoJSONFormatter;

impl OutputGenerator for GeoJSONFormatter {
    fn format(&self, df: &mut DataFrame) -> Result<String> {
        let collection = geojson::FeatureCollection {
            bbox: None,
            features: features(df)?,
            foreign_members: None,
        };
        Ok(collection.to_string())
    }

    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        writer.write_all(self.format(df)?.as_bytes())?;
        Ok(())
    }
}

/// Newline-delimited GeoJSON features.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct GeoJSONSeqFormatter;

impl OutputGenerator for GeoJSONSeqFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        for feature in features(df)? {
            writeln!(writer, "{feature}")?;
        }
        Ok(())
    }
}

/// Encoding of the geometry column in tabular output.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum GeoFormat {
    /// Hex-encoded well-known binary
    Wkb,
    #[default]
    Wkt,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CSVFormatter {
    pub geo_format: GeoFormat,
}

impl OutputGenerator for CSVFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> Result<()> {
        match self.geo_format {
            GeoFormat::Wkb if df.get_column_index(COL::GEOMETRY).is_some() => {
                let mut df = df.clone();
                let encoded = wkt_to_wkb_hex(df.column(COL::GEOMETRY)?)?;
                df.with_column(encoded)?;
                CsvWriter::new(writer).finish(&mut df)?;
            }
            _ => CsvWriter::new(writer).finish(df)?,
        }
        Ok(())
    }
}
