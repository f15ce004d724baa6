use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaceFinderError {
    #[error("Query error: {0}")]
    Query(#[from] crate::query::QueryError),
    #[error("Search error: {0}")]
    Search(#[from] crate::search::SearchError),
    #[error("Index error: {0}")]
    Index(#[from] crate::index::IndexError),
    #[error("Ingest error: {0}")]
    Ingest(#[from] crate::ingest::IngestError),
    #[error("Data processing error: {0}")]
    DataProcessing(#[from] placefinder_data_processing::DataError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlaceFinderError {
    /// Whether the caller sent an invalid request, as opposed to the engine
    /// or its backend failing.
    pub const fn is_bad_request(&self) -> bool {
        match self {
            Self::Query(_) => true,
            Self::Search(err) => err.is_bad_request(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlaceFinderError>;
