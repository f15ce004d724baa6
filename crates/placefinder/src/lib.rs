//! Placefinder - Geocoding Query Engine
//!
//! Placefinder turns OpenStreetMap-derived places into denormalized search
//! documents and answers geocoding requests against them. Requests come in
//! three shapes: free text, structured address fields and reverse (around a
//! point). Each is compiled into a backend-agnostic [`RetrievalPlan`] and
//! executed by a [`SearchIndex`], either the in-process [`MemoryIndex`] or
//! an OpenSearch cluster.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use placefinder::data_processing::test_data::{TestDataConfig, create_test_dump};
//! use placefinder::data_processing::PlaceDump;
//! use placefinder::{EngineConfig, FreeTextRequest, ImportPipeline, MemoryIndex, Searcher};
//!
//! let dump_file = create_test_dump(&TestDataConfig::sample())?;
//! let source = Arc::new(PlaceDump::open(dump_file.path())?);
//! let index = Arc::new(MemoryIndex::new());
//! let config = EngineConfig::default();
//!
//! // Import every country of the dump
//! ImportPipeline::new(source, index.clone(), config.clone()).run()?;
//!
//! // Search it
//! let searcher = Searcher::builder(index).config(config).build()?;
//! let response = searcher.search(&FreeTextRequest::new("Berlin"))?;
//! if let Some(hit) = response.hits.first() {
//!     println!("Found: {}", hit.localized("name", "default").unwrap_or("Unknown"));
//! }
//! # Ok::<(), placefinder::error::PlaceFinderError>(())
//! ```
//!
//! # Features
//!
//! - **Address expansion**: multi-valued house numbers and interpolation
//!   lines become one document per house number
//! - **Tuned ranking**: fuzzy and prefix matching, importance and location
//!   bias, lenient retries when a strict plan finds nothing
//! - **Filters**: OSM tag filters, layers, hierarchical categories and
//!   bounding boxes
//! - **Incremental updates**: an update log keeps an index current
//!   without a full re-import
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod ingest;
pub mod query;
pub mod search;

pub use config::{ClassificationConfig, EngineConfig, EngineConfigBuilder, ExtraTagsConfig, RelevanceParams};
pub use document::{DocumentFactory, IndexRecord, NameMap, ObjectType, PlaceDocument};
#[cfg(feature = "opensearch")]
pub use index::{OpenSearchConfig, OpenSearchIndex};
pub use index::{BulkResult, IndexProperties, MemoryIndex, RankedHit, SearchIndex};
pub use ingest::{ImportPipeline, ImportStats, Importer, UpdatePipeline, UpdateStats, Updater};
pub use placefinder_data_processing as data_processing;
pub use placefinder_data_processing::{PlaceDump, PlaceSource};
pub use query::{
    FreeTextRequest, LocationBias, RequestOptions, RetrievalPlan, ReverseRequest, StructuredAddress,
    StructuredRequest, TagFilter,
};
pub use search::{SearchResponse, Searcher, SearcherBuilder};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the Placefinder library.
///
/// This sets up structured logging with configurable levels and filtering.
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Examples
///
/// ```rust
/// use placefinder::init_logging;
/// use tracing::Level;
///
/// // Initialize with info-level logging
/// init_logging(Level::INFO)?;
/// # Ok::<(), placefinder::error::PlaceFinderError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::PlaceFinderError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("tantivy=warn".parse()?)
            .add_directive("hyper_util=warn".parse()?)
            .add_directive("reqwest=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}
