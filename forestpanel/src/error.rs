//! Error types.

/// Failures raised by the harmonisation pipeline and the entity accessors.
///
/// `MissingColumn`, `AmbiguousColumn`, `DuplicateColumn`, `NoDatasets` and `DuplicateDataset`
/// mean the inputs do not have the shape the pipeline relies on, and abort the run. `NotLoaded`
/// means an accessor was handed a table that was never populated. `EntityNotFound` is the only
/// variant that reflects user input and is expected to be handled by callers.
#[derive(thiserror::Error, Debug)]
pub enum ForestPanelError {
    #[error("Required column '{column}' not found in {table}")]
    MissingColumn { table: String, column: String },
    #[error("Columns {candidates:?} in {table} all normalise to '{column}'")]
    AmbiguousColumn {
        table: String,
        column: String,
        candidates: Vec<String>,
    },
    #[error("Column '{column}' from {table} would overwrite an existing panel column")]
    DuplicateColumn { table: String, column: String },
    #[error("No datasets were provided to the pipeline")]
    NoDatasets,
    #[error("Dataset '{0}' is configured more than once")]
    DuplicateDataset(String),
    #[error("Table '{0}' is not loaded.")]
    NotLoaded(String),
    #[error("Entity '{entity}' not found in {table}.")]
    EntityNotFound { table: String, entity: String },
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
    #[error("Wrapped anyhow error: {0}")]
    AnyhowError(#[from] anyhow::Error),
}

impl ForestPanelError {
    /// Whether the error is a recoverable lookup miss rather than a broken pipeline.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound { .. })
    }
}

pub type ForestPanelResult<T> = Result<T, ForestPanelError>;
