//! Writing documents into a search index.
//!
//! [`Importer`] and [`Updater`] take the documents of one place at a time.
//! [`ImportPipeline`] and [`UpdatePipeline`] drive them from a
//! [`PlaceSource`](placefinder_data_processing::PlaceSource).
//!
//! Bulk write failures are logged and skipped; an import finishes degraded
//! rather than aborting. Source read errors and failures to finalize the
//! index are returned.

pub use error::IngestError;
pub(crate) use error::Result;

mod importer;
mod pipeline;
mod updater;

pub use importer::{ImportStats, Importer};
pub use pipeline::{ImportPipeline, UpdatePipeline};
pub use updater::{UpdateStats, Updater};

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum IngestError {
        #[error("Index error: {0}")]
        Index(#[from] crate::index::IndexError),
        #[error("Source error: {0}")]
        Source(#[from] placefinder_data_processing::DataError),
        #[error("Worker pool error: {0}")]
        ThreadPool(#[from] rayon::ThreadPoolBuildError),
        #[error("Import queue lock poisoned")]
        Poisoned,
    }

    pub type Result<T> = std::result::Result<T, IngestError>;
}
