use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;
pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(#[from] chrono::ParseError),
    #[error("Invalid record in row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },
    #[error("Required data file not found: {0}")]
    RequiredFilesNotFound(PathBuf),
}
