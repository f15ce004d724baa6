use std::collections::BTreeMap;

use placefinder_data_processing::RawPlaceRecord;
use tracing::trace;

use super::{NameMap, PlaceDocument, expand_address, interpolate};
use crate::config::{EngineConfig, RelevanceParams};

/// Turns raw source records into the documents to index.
#[derive(Debug, Clone)]
pub struct DocumentFactory {
    languages: Vec<String>,
    params: RelevanceParams,
}

impl DocumentFactory {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            languages: config.languages.clone(),
            params: config.relevance.clone(),
        }
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// The document for `record` before house-number expansion.
    pub fn base_document(
        &self,
        record: &RawPlaceRecord,
        country_names: Option<&BTreeMap<String, String>>,
    ) -> PlaceDocument {
        let categories = if record.categories.is_empty() {
            vec![format!("osm.{}.{}", record.osm_key, record.osm_value)]
        } else {
            record.categories.clone()
        };
        let centroid = record
            .centroid
            .or_else(|| record.geometry.as_ref().and_then(|g| g.centroid()));

        let mut builder = PlaceDocument::builder(
            record.place_id,
            &record.osm_type,
            record.osm_id,
            &record.osm_key,
            &record.osm_value,
        )
        .names(NameMap::for_place(&record.names, &self.languages))
        .extra_tags(record.extra_tags.clone())
        .categories(categories)
        .importance(record.effective_importance())
        .country_code(record.country_code.as_deref())
        .rank_address(record.rank_address)
        .postcode(record.postcode.clone())
        .bbox(record.effective_bbox())
        .geometry(record.geometry.clone())
        .address_rows(&record.address_rows, &self.languages)
        .address_tags(&record.address, &self.languages)
        .country(country_names.map(|names| NameMap::for_place(names, &self.languages)));

        if let Some(centroid) = centroid {
            builder = builder.centroid(centroid);
        }
        builder.finish()
    }

    /// All documents generated from one record, in object-id order.
    ///
    /// Places linked into another place produce nothing; their names live
    /// on the linking place.
    pub fn documents(
        &self,
        record: &RawPlaceRecord,
        country_names: Option<&BTreeMap<String, String>>,
    ) -> Vec<PlaceDocument> {
        if record.linked_place_id.is_some() {
            trace!(place_id = record.place_id, "Skipping linked place");
            return Vec::new();
        }

        let base = self.base_document(record, country_names);

        if let Some(range) = record.interpolation {
            return record
                .geometry
                .as_ref()
                .and_then(|g| g.as_line_string())
                .map(|line| interpolate(&base, range, &line, &self.params))
                .unwrap_or_default();
        }

        expand_address(&base, &record.address, &self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{AddressType, ObjectType};
    use placefinder_data_processing::test_data::{TestDataConfig, test_records};

    fn record(place_id: i64) -> RawPlaceRecord {
        test_records(&TestDataConfig::sample())
            .into_iter()
            .find(|r| r.place_id == place_id)
            .unwrap()
    }

    fn factory() -> DocumentFactory {
        DocumentFactory::new(&EngineConfig::default())
    }

    #[test]
    fn test_street_document() {
        let country = BTreeMap::from([("name".to_string(), "Deutschland".to_string())]);
        let docs = factory().documents(&record(1002), Some(&country));
        assert_eq!(docs.len(), 1);

        let street = &docs[0];
        assert_eq!(street.object_type(), ObjectType::Street);
        assert_eq!(street.names().get("default"), Some("Hauptstraße"));
        assert_eq!(
            street.address_part(AddressType::City).and_then(|n| n.get("default")),
            Some("Berlin")
        );
        assert_eq!(
            street.address_part(AddressType::Country).and_then(|n| n.get("default")),
            Some("Deutschland")
        );
        assert_eq!(street.country_code(), Some("DE"));
        assert!(street.categories().contains("osm.highway.residential"));
        assert!(street.bbox().is_some());
    }

    #[test]
    fn test_house_numbers_expand() {
        let docs = factory().documents(&record(1003), None);
        let numbers: Vec<_> = docs.iter().filter_map(PlaceDocument::house_number).collect();
        assert_eq!(numbers, vec!["1", "3"]);
        assert!((docs[0].importance() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolation_record() {
        let docs = factory().documents(&record(1004), None);
        let numbers: Vec<_> = docs.iter().filter_map(PlaceDocument::house_number).collect();
        assert_eq!(numbers, vec!["2", "4", "6", "8", "10"]);
        assert!(docs.iter().all(|d| d.centroid().is_some()));
    }

    #[test]
    fn test_linked_place_is_skipped() {
        assert!(factory().documents(&record(1006), None).is_empty());
    }
}
