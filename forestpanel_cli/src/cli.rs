use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{command, Args, Parser, Subcommand};
use enum_dispatch::enum_dispatch;
use forestpanel::{
    config::Config,
    error::ForestPanelError,
    formatters::{
        CSVFormatter, GeoFormat, GeoJSONFormatter, GeoJSONSeqFormatter, OutputFormatter,
        OutputGenerator,
    },
    ForestPanel, JOINED_TABLE,
};
use log::{debug, info};
use polars::frame::DataFrame;
use serde::{Deserialize, Serialize};
use spinners::{Spinner, Spinners};
use strum_macros::EnumString;

use crate::display::{dataset_summaries, display_datasets, display_rows};
use crate::error::ForestPanelCliResult;

const DEFAULT_PROGRESS_SPINNER: Spinners = Spinners::Dots;
const COMPLETE_PROGRESS_STRING: &str = "✔";
const RUNNING_TAIL_STRING: &str = "...";
const BUILDING_PANEL_STRING: &str = "Loading datasets and building panel";

/// Defines the output formats we are able to produce data in.
#[derive(Clone, Debug, Deserialize, Serialize, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum OutputFormat {
    GeoJSON,
    GeoJSONSeq,
    Csv,
}

impl OutputFormat {
    fn formatter(&self, wkb: bool) -> OutputFormatter {
        match self {
            OutputFormat::GeoJSON => OutputFormatter::GeoJSON(GeoJSONFormatter),
            OutputFormat::GeoJSONSeq => OutputFormatter::GeoJSONSeq(GeoJSONSeqFormatter),
            OutputFormat::Csv => OutputFormatter::Csv(CSVFormatter {
                geo_format: if wkb { GeoFormat::Wkb } else { GeoFormat::Wkt },
            }),
        }
    }
}

fn write_output<T, U>(
    output_generator: T,
    mut data: DataFrame,
    output_file: Option<U>,
) -> ForestPanelCliResult<()>
where
    T: OutputGenerator,
    U: AsRef<Path>,
{
    if let Some(output_file) = output_file {
        let mut f = File::create(output_file).context("Failed to write output")?;
        output_generator.save(&mut f, &mut data)?;
    } else {
        let mut stdout_lock = std::io::stdout().lock();
        output_generator.save(&mut stdout_lock, &mut data)?;
    };
    Ok(())
}

/// Runs the pipeline behind a spinner unless `quiet` is set.
fn build_panel(config: Config, quiet: bool) -> ForestPanelCliResult<ForestPanel> {
    let sp = (!quiet).then(|| {
        Spinner::with_timer(
            DEFAULT_PROGRESS_SPINNER,
            BUILDING_PANEL_STRING.to_string() + RUNNING_TAIL_STRING,
        )
    });
    let forest_panel = ForestPanel::new_with_config(config);
    if let Some(mut s) = sp {
        s.stop_with_symbol(COMPLETE_PROGRESS_STRING);
    }
    Ok(forest_panel?)
}

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    fn run(&self, config: Config) -> ForestPanelCliResult<()>;
}

/// The `datasets` command lists the configured datasets with their titles and the panel
/// columns they contribute.
#[derive(Args, Debug)]
pub struct DatasetsCommand {
    #[arg(long, help = "Print the listing as JSON")]
    json: bool,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for DatasetsCommand {
    fn run(&self, config: Config) -> ForestPanelCliResult<()> {
        info!("Running `datasets` subcommand");
        let forest_panel = build_panel(config, self.quiet)?;
        let summaries = dataset_summaries(&forest_panel);
        if self.json {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        } else {
            display_datasets(&summaries);
        }
        Ok(())
    }
}

/// The `entity` command prints every row for one entity, from a single dataset or from the
/// geo-joined table.
#[derive(Args, Debug)]
pub struct EntityCommand {
    #[arg(index = 1, help = "Entity name, e.g. 'Portugal'")]
    name: String,
    #[arg(
        short = 'd',
        long,
        help = "Query this dataset instead of the geo-joined table"
    )]
    dataset: Option<String>,
    #[arg(from_global)]
    quiet: bool,
}

impl EntityCommand {
    fn lookup(&self, forest_panel: &ForestPanel) -> ForestPanelCliResult<Option<DataFrame>> {
        let accessor = match &self.dataset {
            Some(dataset) => forest_panel.dataset(dataset),
            None => forest_panel.joined(),
        };
        match accessor.get(&self.name) {
            Ok(rows) => Ok(Some(rows)),
            Err(err) if err.is_not_found() => {
                println!("No rows found for '{}' in {}.", self.name, accessor.table_name());
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl RunCommand for EntityCommand {
    fn run(&self, config: Config) -> ForestPanelCliResult<()> {
        info!("Running `entity` subcommand");
        let forest_panel = build_panel(config, self.quiet)?;
        if let Some(rows) = self.lookup(&forest_panel)? {
            display_rows(&rows)?;
        }
        Ok(())
    }
}

/// The `panel` command exports the geo-joined table.
#[derive(Args, Debug)]
pub struct PanelCommand {
    #[arg(
        short = 'f',
        long,
        value_name = "geojson|geojsonseq|csv",
        help = "Output format for the results"
    )]
    output_format: OutputFormat,
    #[arg(short = 'o', long, help = "Output file to place the results")]
    output_file: Option<PathBuf>,
    #[arg(short = 'y', long, help = "Only join measurements from this year")]
    year: Option<i64>,
    #[arg(long, help = "Encode geometries as hex WKB in CSV output")]
    wkb: bool,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for PanelCommand {
    fn run(&self, mut config: Config) -> ForestPanelCliResult<()> {
        info!("Running `panel` subcommand");
        if self.year.is_some() {
            config.year = self.year;
        }
        let forest_panel = build_panel(config, self.quiet)?;
        let joined = forest_panel
            .joined_table()
            .ok_or_else(|| ForestPanelError::NotLoaded(JOINED_TABLE.into()))?
            .clone();
        debug!("Exporting joined table with shape {:?}", joined.shape());
        write_output(
            self.output_format.formatter(self.wkb),
            joined,
            self.output_file.as_deref(),
        )?;
        Ok(())
    }
}

/// The entrypoint for the CLI.
#[derive(Parser, Debug)]
#[command(version, about="Harmonise forest datasets into a country panel joined to geometries", long_about = None, name="forestpanel")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(
        short = 'c',
        long = "config",
        help = "Config file to use instead of the one in the user config directory",
        global = true
    )]
    pub config: Option<PathBuf>,
    #[arg(
        short = 'q',
        long = "quiet",
        help = "\
            Do not print progress bar to stdout. Results and logs (when `RUST_LOG`\n\
            is set) will still be printed.",
        global = true
    )]
    quiet: bool,
}

/// Commands contains the list of subcommands available for use in the CLI.
#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// List the configured datasets
    Datasets(DatasetsCommand),
    /// Show all rows for one entity
    Entity(EntityCommand),
    /// Export the geo-joined panel
    Panel(PanelCommand),
}
