//! The search index gateway.
//!
//! [`SearchIndex`] is the only way the rest of the crate talks to a search
//! backend: it executes [`RetrievalPlan`]s and stores [`IndexRecord`]s.
//! Two adapters are provided. [`MemoryIndex`] evaluates plans in process
//! and backs tests and small deployments; `OpenSearchIndex` (feature
//! `opensearch`) translates plans into the OpenSearch query DSL.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use placefinder_data_processing::{Envelope, Geometry, Point};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

pub use error::{IndexError, Result};

use crate::config::{EngineConfig, ExtraTagsConfig};
use crate::document::{AddressType, IndexRecord, NameMap};
use crate::error::PlaceFinderError;
use crate::query::RetrievalPlan;

pub mod analysis;
mod memory;
#[cfg(feature = "opensearch")]
mod opensearch;
mod scoring;

pub use memory::MemoryIndex;
#[cfg(feature = "opensearch")]
pub use opensearch::{OpenSearchConfig, OpenSearchIndex};

/// Version of the index layout. Indexes written with another version must
/// be re-imported.
pub const DATABASE_VERSION: &str = "1.0.0";

/// Name variants tried, in order, when no name in the requested language
/// exists.
const NAME_PRECEDENCE: [&str; 7] = ["default", "housename", "int", "loc", "reg", "alt", "old"];

/// Backend executing retrieval plans and storing index records.
///
/// Implementations must be safe to share between threads: searches run
/// concurrently and import workers write through the same handle.
pub trait SearchIndex: Send + Sync {
    /// At most `limit` hits, best first (or nearest first for distance
    /// sorted plans).
    fn search(&self, plan: &RetrievalPlan, limit: usize) -> Result<Vec<RankedHit>>;

    /// Create or overwrite records by id. Per-record failures are reported
    /// in the result rather than as an error.
    fn bulk_upsert(&self, records: &[IndexRecord]) -> Result<BulkResult>;

    /// Remove a record. Returns whether it existed.
    fn delete(&self, id: &str) -> Result<bool>;

    /// Whether a record exists, including writes not yet refreshed.
    fn exists(&self, id: &str) -> Result<bool>;

    /// Make all previous writes visible to searches.
    fn refresh(&self) -> Result<()>;

    fn load_properties(&self) -> Result<Option<IndexProperties>>;

    fn save_properties(&self, properties: &IndexProperties) -> Result<()>;
}

/// Metadata stored alongside the records of an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexProperties {
    pub database_version: String,
    /// Languages names were imported for; `None` when unrestricted.
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub import_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub extra_tags: ExtraTagsConfig,
    #[serde(default)]
    pub supports_structured: bool,
}

impl IndexProperties {
    pub fn for_config(config: &EngineConfig) -> Self {
        Self {
            database_version: DATABASE_VERSION.to_string(),
            languages: Some(config.languages.clone()),
            import_date: None,
            extra_tags: config.extra_tags.clone(),
            supports_structured: true,
        }
    }

    #[must_use]
    pub const fn with_import_date(mut self, date: DateTime<Utc>) -> Self {
        self.import_date = Some(date);
        self
    }

    pub fn check_version(&self) -> crate::error::Result<()> {
        if self.database_version == DATABASE_VERSION {
            Ok(())
        } else {
            Err(PlaceFinderError::ConfigError(format!(
                "Index has version {} but version {DATABASE_VERSION} is required. Please re-import the data.",
                self.database_version
            )))
        }
    }

    /// Requested languages that the index actually has names for, in the
    /// requested order.
    pub fn restrict_languages(&self, requested: &[String]) -> crate::error::Result<Vec<String>> {
        let Some(available) = &self.languages else {
            return Ok(requested.to_vec());
        };
        let restricted: Vec<String> = requested
            .iter()
            .filter(|lang| available.contains(lang))
            .cloned()
            .collect();
        if restricted.is_empty() {
            return Err(PlaceFinderError::ConfigError(format!(
                "Index only supports languages {available:?}, none of {requested:?} is available"
            )));
        }
        if restricted.len() < requested.len() {
            info!(?requested, ?restricted, "Restricting languages to those in the index");
        }
        Ok(restricted)
    }
}

/// Outcome of one record in a bulk write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemStatus {
    pub id: String,
    /// Failure cause, `None` on success.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BulkResult {
    pub items: Vec<BulkItemStatus>,
}

impl BulkResult {
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|item| item.error.is_some())
    }

    pub fn failed(&self) -> impl Iterator<Item = &BulkItemStatus> {
        self.items.iter().filter(|item| item.error.is_some())
    }
}

/// One search hit with its stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    pub id: String,
    pub score: f32,
    pub record: IndexRecord,
}

/// Fields that do not depend on the output language.
const PLAIN_KEYS: [&str; 8] = [
    "osm_type",
    "osm_id",
    "osm_key",
    "osm_value",
    "type",
    "postcode",
    "housenumber",
    "countrycode",
];

impl RankedHit {
    pub const fn coordinate(&self) -> Option<Point> {
        self.record.coordinate
    }

    pub const fn extent(&self) -> Option<Envelope> {
        self.record.extent
    }

    pub const fn geometry(&self) -> Option<&Geometry> {
        self.record.geometry.as_ref()
    }

    /// Value of a language dependent field (`name` or an address part) in
    /// `language`, falling back to other variants.
    pub fn localized(&self, key: &str, language: &str) -> Option<&str> {
        if key == "name" {
            let names = &self.record.name;
            return names
                .get(language)
                .or_else(|| NAME_PRECEDENCE.iter().find_map(|k| names.get(k)));
        }
        let names: &NameMap = self.record.address_part(AddressType::from_name(key)?)?;
        names.get(language).or_else(|| names.get("default"))
    }

    fn plain(&self, key: &str) -> Option<String> {
        let r = &self.record;
        match key {
            "osm_type" => Some(r.osm_type.clone()),
            "osm_id" => Some(r.osm_id.to_string()),
            "osm_key" => Some(r.osm_key.clone()),
            "osm_value" => Some(r.osm_value.clone()),
            "type" => Some(r.object_type.name().to_string()),
            "postcode" => r.postcode.clone(),
            "housenumber" => r.housenumber.clone(),
            "countrycode" => r.countrycode.clone(),
            _ => None,
        }
    }

    /// All displayable tags of the hit for one language.
    pub fn localized_tags(&self, language: &str) -> BTreeMap<String, String> {
        let plain = PLAIN_KEYS
            .iter()
            .filter_map(|key| self.plain(key).map(|v| ((*key).to_string(), v)));
        let localized = std::iter::once("name")
            .chain(AddressType::ALL.iter().map(|t| t.name()))
            .filter_map(|key| self.localized(key, language).map(|v| (key.to_string(), v.to_string())));
        plain.chain(localized).collect()
    }

    /// The hit as a GeoJSON feature.
    pub fn to_feature(&self, language: &str, with_geometry: bool) -> Value {
        let mut properties: serde_json::Map<String, Value> = self
            .localized_tags(language)
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        if let Some(e) = self.extent() {
            properties.insert("extent".to_string(), json!([e.min_lon, e.max_lat, e.max_lon, e.min_lat]));
        }
        if !self.record.extra.is_empty() {
            properties.insert("extra".to_string(), json!(self.record.extra));
        }

        let geometry = match (with_geometry, self.geometry(), self.coordinate()) {
            (true, Some(geometry), _) => json!(geometry),
            (_, _, Some(c)) => json!({"type": "Point", "coordinates": [c.lon, c.lat]}),
            _ => Value::Null,
        };
        json!({"type": "Feature", "properties": properties, "geometry": geometry})
    }
}

mod error {
    use std::time::Duration;

    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum IndexError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),
        #[cfg(feature = "opensearch")]
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("Request timed out after {0:?}")]
        Timeout(Duration),
        #[error("Backend returned status {status}: {message}")]
        Backend { status: u16, message: String },
        #[error("Index state lock poisoned")]
        Poisoned,
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, IndexError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{PlaceDocument, RecordContext};

    fn hit() -> RankedHit {
        let doc = PlaceDocument::builder(1, "W", 11, "highway", "residential")
            .names(NameMap::new().with("default", "Hauptstraße").with("alt", "Main Street").with("en", "Main Street"))
            .address_tags(
                &BTreeMap::from([("city".to_string(), "Berlin".to_string())]),
                &[],
            )
            .postcode(Some("10117".to_string()))
            .rank_address(26)
            .centroid(Point::new(13.4, 52.5))
            .finish();
        RankedHit {
            id: "1".to_string(),
            score: 1.0,
            record: IndexRecord::from_document("1".to_string(), &doc, &RecordContext::default()),
        }
    }

    #[test]
    fn test_localized_names() {
        let hit = hit();
        assert_eq!(hit.localized("name", "en"), Some("Main Street"));
        assert_eq!(hit.localized("name", "fr"), Some("Hauptstraße"));
        assert_eq!(hit.localized("city", "fr"), Some("Berlin"));
        assert_eq!(hit.localized("county", "fr"), None);
        assert_eq!(hit.localized("nonsense", "fr"), None);

        let tags = hit.localized_tags("de");
        assert_eq!(tags.get("type").map(String::as_str), Some("street"));
        assert_eq!(tags.get("postcode").map(String::as_str), Some("10117"));
        assert!(!tags.contains_key("housenumber"));
    }

    #[test]
    fn test_feature_json() {
        let feature = hit().to_feature("default", true);
        assert_eq!(feature["geometry"]["type"], "Point");
        assert_eq!(feature["geometry"]["coordinates"][0], 13.4);
        assert_eq!(feature["properties"]["name"], "Hauptstraße");
    }

    #[test]
    fn test_properties_checks() {
        let config = EngineConfig::default();
        let props = IndexProperties::for_config(&config);
        assert!(props.check_version().is_ok());

        let old = IndexProperties {
            database_version: "0.3.6".to_string(),
            ..props.clone()
        };
        assert!(matches!(old.check_version(), Err(PlaceFinderError::ConfigError(_))));

        let requested = vec!["fr".to_string(), "es".to_string(), "en".to_string()];
        assert_eq!(props.restrict_languages(&requested).unwrap(), vec!["fr", "en"]);
        assert!(props.restrict_languages(&["es".to_string()]).is_err());

        let open = IndexProperties {
            languages: None,
            ..props
        };
        assert_eq!(open.restrict_languages(&requested).unwrap(), requested);
    }

    #[test]
    fn test_bulk_result() {
        let result = BulkResult {
            items: vec![
                BulkItemStatus { id: "1".to_string(), error: None },
                BulkItemStatus { id: "2".to_string(), error: Some("mapper_parsing_exception".to_string()) },
            ],
        };
        assert!(result.has_errors());
        assert_eq!(result.failed().map(|i| i.id.as_str()).collect::<Vec<_>>(), vec!["2"]);
    }
}
