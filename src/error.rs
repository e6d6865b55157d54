use std::path::PathBuf;
use thiserror::Error;

use crate::types::Column;

/// Failures while building the record store. Fatal: nothing can be queried.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("sheet not found: {sheet} (available: {})", .available.join(", "))]
    SheetNotFound { sheet: String, available: Vec<String> },

    #[error("missing required columns: {}", join_columns(.0))]
    MissingColumns(Vec<Column>),

    #[error("unsupported file type: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// A view asked for a column the loaded dataset does not have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("column not present in dataset: {0}")]
    MissingColumn(Column),

    #[error("none of the grouping columns are present: {}", join_columns(.0))]
    NoFallbackAvailable(Vec<Column>),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error for the binary.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Load(#[from] DataLoadError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

fn join_columns(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| c.header())
        .collect::<Vec<_>>()
        .join(", ")
}
