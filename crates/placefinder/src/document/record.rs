//! The denormalized record stored in the search index.

use std::collections::{BTreeMap, BTreeSet};

use placefinder_data_processing::{Envelope, Geometry, Point};
use serde::{Deserialize, Serialize};

use super::{AddressType, NameMap, ObjectType, PlaceDocument, TermCollector};
use crate::config::{EngineConfig, ExtraTagsConfig};

/// Settings that shape how documents are written.
#[derive(Debug, Clone, Default)]
pub struct RecordContext {
    pub languages: Vec<String>,
    pub extra_tags: ExtraTagsConfig,
}

impl RecordContext {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            languages: config.languages.clone(),
            extra_tags: config.extra_tags.clone(),
        }
    }

    fn is_primary_name(&self, key: &str) -> bool {
        key == super::DEFAULT_NAME_KEY || self.languages.iter().any(|l| l == key)
    }
}

/// Synthetic search fields built from term collectors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Collector {
    pub all: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Street names of a house-number record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Distinct raw values per field (`name`, `street`, `city`, ...).
    #[serde(default)]
    pub field: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Document id; carried next to the body, not inside it.
    #[serde(skip)]
    pub id: String,
    pub place_id: i64,
    pub osm_id: i64,
    pub osm_type: String,
    pub osm_key: String,
    pub osm_value: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub importance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub housenumber: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(default, skip_serializing_if = "NameMap::is_empty")]
    pub name: NameMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countrycode: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "extent_envelope"
    )]
    pub extent: Option<Envelope>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub categories: BTreeSet<String>,
    pub collector: Collector,
    /// Address parts, written as top-level `street`, `city`, ... objects.
    #[serde(flatten)]
    pub address: BTreeMap<AddressType, NameMap>,
}

impl IndexRecord {
    pub fn from_document(id: String, doc: &PlaceDocument, ctx: &RecordContext) -> Self {
        let is_named = !doc.names().is_empty();
        let has_house_number = doc.house_number().is_some();
        let mut all = TermCollector::new();
        let mut names = TermCollector::new();

        if let Some(hnr) = doc.house_number() {
            all.add(hnr, if is_named { 4 } else { 5 });
        }
        if let Some(postcode) = doc.postcode() {
            all.add(postcode, 2);
        }
        for (key, name) in doc.names().iter() {
            let primary = ctx.is_primary_name(key);
            all.add(name, if primary { 5 } else { 2 });
            names.add(name, if primary { 2 } else { 1 });
        }
        for (part, values) in doc.address_parts() {
            let priority = if has_house_number && *part == AddressType::Street {
                5
            } else {
                part.search_priority()
            };
            all.add_all(values.values(), priority);
        }
        if let Some(cc) = doc.country_code() {
            all.add(cc, 2);
        }
        all.add_all(doc.context().all_names(), 1);
        for category in doc.categories() {
            all.add(&format!("#{category}"), 1);
        }
        if let Some(class) = doc.classification() {
            all.add(&class, 1);
        }

        let parent = doc
            .address_part(AddressType::Street)
            .filter(|_| has_house_number)
            .map(|street| street.values().collect::<TermCollector>().to_collector_string());

        let mut field = BTreeMap::new();
        if is_named {
            field.insert("name".to_string(), owned(doc.names().distinct_values()));
        }
        for (part, values) in doc.address_parts() {
            field.insert(part.name().to_string(), owned(values.distinct_values()));
        }

        Self {
            id,
            place_id: doc.place_id(),
            osm_id: doc.osm_id(),
            osm_type: doc.osm_type().to_string(),
            osm_key: doc.osm_key().to_string(),
            osm_value: doc.osm_value().to_string(),
            object_type: doc.object_type(),
            importance: doc.importance(),
            coordinate: doc.centroid().copied(),
            geometry: doc.geometry().filter(|g| !g.is_point()).cloned(),
            housenumber: doc.house_number().map(str::to_string),
            postcode: doc.postcode().map(str::to_string),
            name: doc.names().clone(),
            countrycode: doc.country_code().map(str::to_string),
            extra: ctx.extra_tags.filter(doc.extra_tags()),
            extent: doc.bbox().filter(|b| b.area() > 0.0).copied(),
            categories: doc.categories().clone(),
            collector: Collector {
                all: all.to_collector_string(),
                name: is_named.then(|| names.to_collector_string()),
                parent,
                field,
            },
            address: doc.address_parts().clone(),
        }
    }

    pub fn address_part(&self, part: AddressType) -> Option<&NameMap> {
        self.address.get(&part)
    }
}

fn owned(values: Vec<&str>) -> Vec<String> {
    values.into_iter().map(str::to_string).collect()
}

/// Extents use the GeoJSON-like `envelope` shape:
/// `{"type": "envelope", "coordinates": [[minLon, maxLat], [maxLon, minLat]]}`.
mod extent_envelope {
    use placefinder_data_processing::Envelope;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Shape {
        #[serde(rename = "type")]
        kind: String,
        coordinates: [[f64; 2]; 2],
    }

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(extent: &Option<Envelope>, serializer: S) -> Result<S::Ok, S::Error> {
        extent
            .map(|e| Shape {
                kind: "envelope".to_string(),
                coordinates: [[e.min_lon, e.max_lat], [e.max_lon, e.min_lat]],
            })
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Envelope>, D::Error> {
        Ok(Option::<Shape>::deserialize(deserializer)?.map(|shape| {
            let [[lon1, lat1], [lon2, lat2]] = shape.coordinates;
            Envelope::new(lon1, lat1, lon2, lat2)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::terms::parse_collector_string;

    fn ctx() -> RecordContext {
        RecordContext {
            languages: vec!["en".to_string(), "de".to_string()],
            extra_tags: ExtraTagsConfig::Only(vec!["wheelchair".to_string()]),
        }
    }

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn house() -> PlaceDocument {
        PlaceDocument::builder(7, "N", 70, "building", "yes")
            .rank_address(30)
            .address_tags(
                &tags(&[("street", "Hauptstraße"), ("city", "Berlin"), ("postcode", "10117")]),
                &[],
            )
            .house_number(Some("12"))
            .country_code(Some("de"))
            .categories(["osm.building.yes"])
            .extra_tags(tags(&[("wheelchair", "yes"), ("note", "x")]))
            .bbox(Some(Envelope::new(13.0, 52.0, 13.0, 52.0)))
            .centroid(Point::new(13.0, 52.0))
            .finish()
    }

    #[test]
    fn test_house_number_record() {
        let record = IndexRecord::from_document("7".to_string(), &house(), &ctx());

        assert_eq!(record.object_type, ObjectType::House);
        assert_eq!(record.housenumber.as_deref(), Some("12"));
        assert_eq!(record.countrycode.as_deref(), Some("DE"));
        assert_eq!(record.extra, tags(&[("wheelchair", "yes")]));
        assert!(record.extent.is_none(), "zero-area bbox is not written");
        assert!(record.collector.name.is_none());
        assert_eq!(record.collector.parent.as_deref(), Some("Hauptstraße|1"));

        let all = parse_collector_string(&record.collector.all);
        assert!(all.contains(&("12", 5)));
        assert!(all.contains(&("Hauptstraße", 5)));
        assert!(all.contains(&("Berlin", 3)));
        assert!(all.contains(&("10117", 2)));
        assert!(all.contains(&("DE", 2)));
        assert!(all.contains(&("#osm.building.yes", 1)));
        assert_eq!(
            record.collector.field.get("street"),
            Some(&vec!["Hauptstraße".to_string()])
        );
    }

    #[test]
    fn test_named_record_priorities() {
        let doc = PlaceDocument::builder(8, "W", 80, "amenity", "cafe")
            .names(NameMap::for_place(
                &tags(&[("name", "Café Kranzler"), ("name:en", "Kranzler"), ("old_name", "Kranzler Eck")]),
                &ctx().languages,
            ))
            .house_number(Some("18"))
            .finish();
        let record = IndexRecord::from_document("8".to_string(), &doc, &ctx());

        let all = parse_collector_string(&record.collector.all);
        assert!(all.contains(&("Café Kranzler", 5)));
        assert!(all.contains(&("Kranzler Eck", 2)));
        assert!(all.contains(&("18", 4)));
        let names = parse_collector_string(record.collector.name.as_deref().unwrap());
        assert_eq!(names, vec![("Café Kranzler", 2), ("Kranzler", 2), ("Kranzler Eck", 1)]);
        assert!(record.collector.parent.is_none());
    }

    #[test]
    fn test_json_shape() {
        let doc = PlaceDocument::builder(9, "R", 90, "place", "city")
            .names(NameMap::new().with("default", "Berlin"))
            .bbox(Some(Envelope::new(13.0, 52.3, 13.7, 52.7)))
            .geometry(Some(Geometry::Point([13.4, 52.5])))
            .rank_address(16)
            .finish();
        let record = IndexRecord::from_document("9".to_string(), &doc, &ctx());
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["type"], "city");
        assert_eq!(json["extent"]["type"], "envelope");
        assert_eq!(json["extent"]["coordinates"][0][1], 52.7);
        assert!(json.get("geometry").is_none());
        assert!(json.get("id").is_none());

        let back: IndexRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.extent, record.extent);
        assert_eq!(back.name, record.name);
    }
}
