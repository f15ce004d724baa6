//! The query service.
//!
//! A [`Searcher`] validates requests, compiles them with the query planners,
//! executes the plans against a [`SearchIndex`] and post-processes the hits.
//!
//! Every request runs a strict plan first. Only when that finds nothing is
//! a lenient plan tried, and structured requests with a street get a third
//! attempt without street and house number.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use placefinder::{EngineConfig, FreeTextRequest, IndexProperties, MemoryIndex, SearchIndex, Searcher};
//!
//! let index = Arc::new(MemoryIndex::new());
//! index.save_properties(&IndexProperties::for_config(&EngineConfig::default()))?;
//!
//! let searcher = Searcher::builder(index).build()?;
//! let response = searcher.search(&FreeTextRequest::new("berlin"))?;
//! assert!(response.is_empty());
//! # Ok::<(), placefinder::error::PlaceFinderError>(())
//! ```

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

pub use dedupe::remove_duplicate_streets;
pub use error::SearchError;
use error::Result;

mod dedupe;

use crate::config::EngineConfig;
use crate::error::PlaceFinderError;
use crate::index::{RankedHit, SearchIndex};
use crate::query::{
    FreeTextRequest, QueryError, RequestOptions, RetrievalPlan, ReverseRequest, StructuredRequest,
    plan_free_text, plan_reverse, plan_structured,
};

/// Number of hits to fetch for `limit` results, leaving room for
/// duplicates removed afterwards.
pub fn ext_limit(limit: usize) -> usize {
    if limit > 1 {
        (limit as f64 * 1.5).round() as usize
    } else {
        1
    }
}

/// Hits of one request, ready for output.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub language: String,
    pub return_geometry: bool,
    pub hits: Vec<RankedHit>,
}

impl SearchResponse {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RankedHit> {
        self.hits.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.id.as_str()).collect()
    }

    /// The hits as a GeoJSON feature collection.
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .hits
            .iter()
            .map(|hit| hit.to_feature(&self.language, self.return_geometry))
            .collect();
        json!({"type": "FeatureCollection", "features": features})
    }
}

/// Answers free-text, structured and reverse requests from one index.
///
/// Cheap to share between threads; all state is immutable after
/// construction.
#[derive(Clone)]
pub struct Searcher {
    index: Arc<dyn SearchIndex>,
    config: EngineConfig,
    supports_structured: bool,
}

impl std::fmt::Debug for Searcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Searcher")
            .field("config", &self.config)
            .field("supports_structured", &self.supports_structured)
            .finish_non_exhaustive()
    }
}

impl Searcher {
    pub fn builder(index: Arc<dyn SearchIndex>) -> SearcherBuilder {
        SearcherBuilder::new(index)
    }

    /// Open a searcher over an imported index.
    ///
    /// Fails when the index was written by an incompatible version or has
    /// names for none of the configured languages. Languages the index
    /// lacks are dropped from the configuration.
    #[instrument(name = "Open Searcher", skip_all, level = "info")]
    pub fn open(index: Arc<dyn SearchIndex>, mut config: EngineConfig) -> crate::error::Result<Self> {
        let properties = index.load_properties()?.ok_or_else(|| {
            PlaceFinderError::ConfigError(
                "Index has no properties. Please import data first.".to_string(),
            )
        })?;
        properties.check_version()?;
        config.languages = properties.restrict_languages(&config.languages)?;
        if !config.supports_language(&config.default_language) {
            warn!(
                language = %config.default_language,
                "Default language is not in the index, falling back to 'default'"
            );
            config.default_language = "default".to_string();
        }
        info!(
            languages = ?config.languages,
            import_date = ?properties.import_date,
            "Searcher ready"
        );
        Ok(Self {
            index,
            config,
            supports_structured: properties.supports_structured,
        })
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn supports_structured(&self) -> bool {
        self.supports_structured
    }

    #[instrument(
        name = "Free Text Search",
        skip_all,
        level = "info",
        fields(query = request.query.as_deref().unwrap_or_default())
    )]
    pub fn search(&self, request: &FreeTextRequest) -> Result<SearchResponse> {
        Self::check(request.validate(&self.config))?;
        let params = &self.config.relevance;
        let options = &request.options;
        let limit = self.limit(options);

        let mut hits = self.run(&plan_free_text(request, params, false), ext_limit(limit))?;
        if hits.is_empty() {
            debug!("No strict results, retrying leniently");
            hits = self.run(&plan_free_text(request, params, true), ext_limit(limit))?;
        }
        Ok(self.respond(hits, options, limit, options.dedupe))
    }

    #[instrument(name = "Structured Search", skip_all, level = "info")]
    pub fn structured(&self, request: &StructuredRequest) -> Result<SearchResponse> {
        if !self.supports_structured {
            return Err(QueryError::bad_request("Structured queries are not supported by this index.").into());
        }
        Self::check(request.validate(&self.config))?;
        let params = &self.config.relevance;
        let options = &request.options;
        let limit = self.limit(options);

        let mut hits = self.run(&plan_structured(request, params, false), ext_limit(limit))?;
        if hits.is_empty() {
            debug!("No strict results, retrying leniently");
            hits = self.run(&plan_structured(request, params, true), ext_limit(limit))?;
        }
        if hits.is_empty() && request.address.has_street() {
            debug!("No lenient results, retrying without street");
            let fallback = StructuredRequest {
                address: request.address.without_street(),
                options: options.clone(),
            };
            hits = self.run(&plan_structured(&fallback, params, true), ext_limit(limit))?;
        }
        Ok(self.respond(hits, options, limit, options.dedupe))
    }

    #[instrument(
        name = "Reverse Search",
        skip_all,
        level = "info",
        fields(lon = request.location.lon, lat = request.location.lat)
    )]
    pub fn reverse(&self, request: &ReverseRequest) -> Result<SearchResponse> {
        Self::check(request.validate(&self.config))?;
        let options = &request.options;
        let limit = options.resolved_limit(self.config.reverse_default_limit, self.config.max_results);
        let hits = self.run(&plan_reverse(request, &self.config), limit)?;
        Ok(self.respond(hits, options, limit, false))
    }

    fn check(validation: std::result::Result<(), QueryError>) -> Result<()> {
        validation.map_err(|err| {
            debug!(error = %err, "Rejected request");
            err.into()
        })
    }

    fn limit(&self, options: &RequestOptions) -> usize {
        options.resolved_limit(self.config.default_limit, self.config.max_results)
    }

    fn run(&self, plan: &RetrievalPlan, limit: usize) -> Result<Vec<RankedHit>> {
        let hits = self.index.search(plan, limit)?;
        debug!(limit, hits = hits.len(), "Executed plan");
        Ok(hits)
    }

    fn respond(&self, hits: Vec<RankedHit>, options: &RequestOptions, limit: usize, dedupe: bool) -> SearchResponse {
        let language = options.resolved_language(&self.config).to_string();
        let mut hits = if dedupe {
            remove_duplicate_streets(hits, &language)
        } else {
            hits
        };
        hits.truncate(limit);
        SearchResponse {
            language,
            return_geometry: options.return_geometry,
            hits,
        }
    }
}

/// Builder for [`Searcher`] instances.
pub struct SearcherBuilder {
    index: Arc<dyn SearchIndex>,
    config: Option<EngineConfig>,
}

impl SearcherBuilder {
    /// Create a new builder over `index`.
    #[must_use]
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index, config: None }
    }

    /// Set the engine configuration. Defaults to [`EngineConfig::default`].
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the `Searcher`, checking the index properties.
    pub fn build(self) -> crate::error::Result<Searcher> {
        Searcher::open(self.index, self.config.unwrap_or_default())
    }
}

mod error {
    use thiserror::Error;

    use crate::index::IndexError;
    use crate::query::QueryError;

    #[derive(Error, Debug)]
    pub enum SearchError {
        #[error(transparent)]
        Query(#[from] QueryError),
        #[error("Index error: {0}")]
        Index(#[from] IndexError),
    }

    impl SearchError {
        pub const fn is_bad_request(&self) -> bool {
            matches!(self, Self::Query(_))
        }
    }

    pub type Result<T> = std::result::Result<T, SearchError>;
}
