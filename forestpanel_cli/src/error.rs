use forestpanel::error::ForestPanelError;
use polars::error::PolarsError;

#[derive(thiserror::Error, Debug)]
pub enum ForestPanelCliError {
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("serde JSON error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("forestpanel error: {0}")]
    ForestPanelError(#[from] ForestPanelError),
    #[error("std IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type ForestPanelCliResult<T> = Result<T, ForestPanelCliError>;
