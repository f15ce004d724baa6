//! Raw place records as delivered by an external source.
//!
//! A raw record is transient: it is read from a [`PlaceSource`], turned into
//! one or more indexable documents by the core crate, and dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geo::{Envelope, Geometry, Point};

pub mod dump;
pub mod updates;

pub use super::error::Result;

/// One line of a place's pre-computed address hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAddressRow {
    pub place_id: i64,
    pub name: BTreeMap<String, String>,
    pub osm_key: String,
    pub osm_value: String,
    pub rank_address: u8,
}

impl RawAddressRow {
    pub fn is_postcode(&self) -> bool {
        matches!(
            (self.osm_key.as_str(), self.osm_value.as_str()),
            ("place", "postcode") | ("boundary", "postal_code")
        )
    }

    /// Rows that are worth keeping as context when their address slot is
    /// already taken: named, not a postcode, below continent level and of a
    /// boundary/landuse/place kind.
    pub fn is_useful_for_context(&self) -> bool {
        !self.name.is_empty()
            && !self.is_postcode()
            && self.rank_address >= 4
            && matches!(self.osm_key.as_str(), "boundary" | "landuse" | "place")
    }
}

/// House-number interpolation along a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpolationRange {
    pub first: i64,
    pub last: i64,
    pub step: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPlaceRecord {
    pub place_id: i64,
    pub osm_type: String,
    pub osm_id: i64,
    pub osm_key: String,
    pub osm_value: String,
    pub names: BTreeMap<String, String>,
    pub address: BTreeMap<String, String>,
    pub extra_tags: BTreeMap<String, String>,
    pub centroid: Option<Point>,
    pub geometry: Option<Geometry>,
    pub bbox: Option<Envelope>,
    pub importance: Option<f64>,
    pub rank_search: Option<u8>,
    pub rank_address: u8,
    pub country_code: Option<String>,
    pub postcode: Option<String>,
    pub linked_place_id: Option<i64>,
    pub categories: Vec<String>,
    /// Enclosing places, most specific first.
    pub address_rows: Vec<RawAddressRow>,
    pub interpolation: Option<InterpolationRange>,
}

impl RawPlaceRecord {
    /// Importance, falling back to a value derived from the search rank.
    pub fn effective_importance(&self) -> f64 {
        self.importance.unwrap_or_else(|| {
            0.75 - f64::from(self.rank_search.unwrap_or(self.rank_address)) / 40.0
        })
    }

    /// Bounding box from the record or, failing that, its geometry.
    pub fn effective_bbox(&self) -> Option<Envelope> {
        self.bbox
            .or_else(|| self.geometry.as_ref().and_then(Geometry::envelope))
    }
}

/// Connector to an external store of raw places.
///
/// Implementations must be shareable between import workers; every call is
/// independent and returns owned records.
pub trait PlaceSource: Send + Sync {
    /// Country codes present in the source, lowercase. Places without a
    /// country are reported under the empty code.
    fn country_codes(&self) -> Result<Vec<String>>;

    fn places_for_country(&self, country_code: &str) -> Result<Vec<RawPlaceRecord>>;

    fn place_by_id(&self, place_id: i64) -> Result<Option<RawPlaceRecord>>;

    /// Localised names of the country itself.
    fn country_names(&self, country_code: &str) -> Result<Option<BTreeMap<String, String>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, value: &str, rank: u8) -> RawAddressRow {
        RawAddressRow {
            place_id: 1,
            name: BTreeMap::from([("name".to_string(), "X".to_string())]),
            osm_key: key.to_string(),
            osm_value: value.to_string(),
            rank_address: rank,
        }
    }

    #[test]
    fn test_address_row_classification() {
        assert!(row("place", "postcode", 25).is_postcode());
        assert!(row("boundary", "postal_code", 25).is_postcode());
        assert!(!row("boundary", "administrative", 8).is_postcode());

        assert!(row("boundary", "administrative", 8).is_useful_for_context());
        assert!(!row("boundary", "administrative", 2).is_useful_for_context());
        assert!(!row("highway", "residential", 26).is_useful_for_context());
        assert!(!row("place", "postcode", 25).is_useful_for_context());
    }

    #[test]
    fn test_importance_fallback() {
        let mut record = RawPlaceRecord {
            rank_search: Some(30),
            ..Default::default()
        };
        assert!((record.effective_importance() - 0.0).abs() < 1e-12);

        record.importance = Some(0.4);
        assert!((record.effective_importance() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_bbox_from_geometry() {
        let record = RawPlaceRecord {
            geometry: Some(Geometry::LineString(vec![[1.0, 1.0], [2.0, 3.0]])),
            ..Default::default()
        };
        assert_eq!(record.effective_bbox(), Some(Envelope::new(1.0, 1.0, 2.0, 3.0)));
    }
}
