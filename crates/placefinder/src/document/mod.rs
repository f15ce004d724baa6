//! The indexable place document and everything needed to build it.
//!
//! A [`PlaceDocument`] is assembled once through [`PlaceDocumentBuilder`]
//! and never mutated afterwards. Variants produced during address expansion
//! are new values derived from a base document (`with_*` methods), so no two
//! documents share address data by reference.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use placefinder_data_processing::{Envelope, Geometry, Point, RawAddressRow};
use serde::{Deserialize, Serialize};

pub mod address;
mod convert;
pub mod interpolation;
pub mod record;
pub mod terms;

pub use address::{expand_address, parse_house_numbers};
pub use convert::DocumentFactory;
pub use interpolation::interpolate;
pub use record::{IndexRecord, RecordContext};
pub use terms::TermCollector;

pub const DEFAULT_NAME_KEY: &str = "default";
pub const DEFAULT_OSM_KEY: &str = "place";
pub const DEFAULT_OSM_VALUE: &str = "yes";

/// Keys of alternative names copied from `<key>_name` tags.
const ALT_NAME_KEYS: [&str; 5] = ["alt", "int", "loc", "old", "reg"];

/// Raw address tag prefixes, matched in order. `None` sends the value to
/// the context instead of an address slot.
const ADDRESS_TAG_PREFIXES: [(&str, Option<AddressType>); 18] = [
    ("street", Some(AddressType::Street)),
    ("city", Some(AddressType::City)),
    ("suburb", Some(AddressType::District)),
    ("neighbourhood", Some(AddressType::Locality)),
    ("county", Some(AddressType::County)),
    ("state", Some(AddressType::State)),
    ("province", Some(AddressType::State)),
    ("other", None),
    ("district", None),
    ("hamlet", None),
    ("subdistrict", None),
    ("municipality", None),
    ("region", None),
    ("ward", None),
    ("village", None),
    ("subward", None),
    ("block", None),
    ("quarter", None),
];

/// Coarse classification of a place, derived from its address rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    House,
    Street,
    Locality,
    District,
    City,
    County,
    State,
    Country,
    Other,
}

impl ObjectType {
    pub const ALL: [Self; 9] = [
        Self::House,
        Self::Street,
        Self::Locality,
        Self::District,
        Self::City,
        Self::County,
        Self::State,
        Self::Country,
        Self::Other,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::House => "house",
            Self::Street => "street",
            Self::Locality => "locality",
            Self::District => "district",
            Self::City => "city",
            Self::County => "county",
            Self::State => "state",
            Self::Country => "country",
            Self::Other => "other",
        }
    }

    const fn rank_range(self) -> Option<(u8, u8)> {
        match self {
            Self::House => Some((29, 30)),
            Self::Street => Some((26, 28)),
            Self::Locality => Some((22, 26)),
            Self::District => Some((17, 22)),
            Self::City => Some((13, 17)),
            Self::County => Some((10, 13)),
            Self::State => Some((5, 10)),
            Self::Country => Some((4, 4)),
            Self::Other => None,
        }
    }

    /// First type whose rank range covers `rank`; uncovered ranks are `Other`.
    pub fn from_rank(rank: u8) -> Self {
        Self::ALL
            .into_iter()
            .find(|t| t.rank_range().is_some_and(|(lo, hi)| (lo..=hi).contains(&rank)))
            .unwrap_or(Self::Other)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub const fn address_type(self) -> Option<AddressType> {
        match self {
            Self::Street => Some(AddressType::Street),
            Self::Locality => Some(AddressType::Locality),
            Self::District => Some(AddressType::District),
            Self::City => Some(AddressType::City),
            Self::County => Some(AddressType::County),
            Self::State => Some(AddressType::State),
            Self::Country => Some(AddressType::Country),
            Self::House | Self::Other => None,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Slot of the address hierarchy a name can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    Street,
    Locality,
    District,
    City,
    County,
    State,
    Country,
}

impl AddressType {
    pub const ALL: [Self; 7] = [
        Self::Street,
        Self::Locality,
        Self::District,
        Self::City,
        Self::County,
        Self::State,
        Self::Country,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Street => "street",
            Self::Locality => "locality",
            Self::District => "district",
            Self::City => "city",
            Self::County => "county",
            Self::State => "state",
            Self::Country => "country",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Term priority of this part in the catch-all collector.
    pub const fn search_priority(self) -> u32 {
        match self {
            Self::Street | Self::Locality | Self::District | Self::City => 3,
            Self::County | Self::State => 2,
            Self::Country => 1,
        }
    }

    /// Slot filled by an enclosing address row. Ranges are half-open except
    /// for countries, which must be administrative boundaries of rank 4.
    pub fn for_address_row(row: &RawAddressRow) -> Option<Self> {
        match row.rank_address {
            26..28 => Some(Self::Street),
            22..26 => Some(Self::Locality),
            17..22 => Some(Self::District),
            13..17 => Some(Self::City),
            10..13 => Some(Self::County),
            5..10 => Some(Self::State),
            4 if row.osm_key == "boundary" && row.osm_value == "administrative" => {
                Some(Self::Country)
            }
            _ => None,
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Names of a place keyed by `default`, a language code or an alternative
/// name kind (`alt`, `old`, `housename`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameMap(BTreeMap<String, String>);

impl NameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the indexable names out of raw OSM name tags.
    pub fn for_place(tags: &BTreeMap<String, String>, languages: &[String]) -> Self {
        let mut names = Self::new();
        names.set_first(DEFAULT_NAME_KEY, tags, &["_place_name", "name"]);
        for lang in languages {
            names.set_first(
                lang,
                tags,
                &[&format!("_place_name:{lang}"), &format!("name:{lang}")],
            );
        }
        for alt in ALT_NAME_KEYS {
            names.set_first(
                alt,
                tags,
                &[&format!("_place_{alt}_name"), &format!("{alt}_name")],
            );
        }
        names.set_first("housename", tags, &["addr:housename"]);
        names
    }

    fn set_first(&mut self, field: &str, tags: &BTreeMap<String, String>, keys: &[&str]) {
        if self.0.contains_key(field) {
            return;
        }
        if let Some(value) = keys.iter().find_map(|k| tags.get(*k)) {
            self.0.insert(field.to_string(), value.clone());
        }
    }

    pub fn with(mut self, key: &str, name: &str) -> Self {
        self.0.insert(key.to_string(), name.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: String, name: String) -> Option<String> {
        self.0.insert(key, name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }

    /// Values without duplicates, in key order.
    pub fn distinct_values(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.values().filter(|v| seen.insert(*v)).collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NameMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Secondary names by language key: superseded address names and names of
/// enclosing places that did not fit an address slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextMap(BTreeMap<String, BTreeSet<String>>);

impl ContextMap {
    pub fn add_name(&mut self, key: &str, name: &str) {
        self.0
            .entry(key.to_string())
            .or_default()
            .insert(name.to_string());
    }

    pub fn add_all(&mut self, names: &NameMap) {
        for (key, name) in names.iter() {
            self.add_name(key, name);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self, key: &str) -> impl Iterator<Item = &str> {
        self.0.get(key).into_iter().flatten().map(String::as_str)
    }

    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.0.values().flatten().map(String::as_str)
    }
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// A category is two or more dot-separated labels, e.g. `osm.amenity.cafe`.
pub fn is_valid_category(category: &str) -> bool {
    let mut parts = category.split('.');
    parts.clone().count() >= 2 && parts.all(is_valid_label)
}

/// The `#osm.<key>.<value>` tag used for category matching.
pub fn classification_string(key: &str, value: &str) -> Option<String> {
    (is_valid_label(key) && is_valid_label(value)).then(|| format!("#osm.{key}.{value}"))
}

/// Identifier of the `object_id`-th document generated from one place.
pub fn document_id(place_id: i64, object_id: u32) -> String {
    if object_id == 0 {
        place_id.to_string()
    } else {
        format!("{place_id}.{object_id}")
    }
}

/// Inverse of [`document_id`].
pub fn parse_document_id(id: &str) -> Option<(i64, u32)> {
    match id.split_once('.') {
        Some((place, object)) => Some((place.parse().ok()?, object.parse().ok()?)),
        None => Some((id.parse().ok()?, 0)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceDocument {
    place_id: i64,
    osm_type: String,
    osm_id: i64,
    osm_key: String,
    osm_value: String,
    names: NameMap,
    house_number: Option<String>,
    postcode: Option<String>,
    extra_tags: BTreeMap<String, String>,
    categories: BTreeSet<String>,
    bbox: Option<Envelope>,
    importance: f64,
    country_code: Option<String>,
    rank_address: u8,
    address: BTreeMap<AddressType, NameMap>,
    context: ContextMap,
    centroid: Option<Point>,
    geometry: Option<Geometry>,
}

impl PlaceDocument {
    pub fn builder(
        place_id: i64,
        osm_type: &str,
        osm_id: i64,
        osm_key: &str,
        osm_value: &str,
    ) -> PlaceDocumentBuilder {
        PlaceDocumentBuilder::new(place_id, osm_type, osm_id, osm_key, osm_value)
    }

    pub const fn place_id(&self) -> i64 {
        self.place_id
    }

    pub fn osm_type(&self) -> &str {
        &self.osm_type
    }

    pub const fn osm_id(&self) -> i64 {
        self.osm_id
    }

    pub fn osm_key(&self) -> &str {
        &self.osm_key
    }

    pub fn osm_value(&self) -> &str {
        &self.osm_value
    }

    pub const fn names(&self) -> &NameMap {
        &self.names
    }

    pub fn house_number(&self) -> Option<&str> {
        self.house_number.as_deref()
    }

    pub fn postcode(&self) -> Option<&str> {
        self.postcode.as_deref()
    }

    pub const fn extra_tags(&self) -> &BTreeMap<String, String> {
        &self.extra_tags
    }

    pub const fn categories(&self) -> &BTreeSet<String> {
        &self.categories
    }

    pub const fn bbox(&self) -> Option<&Envelope> {
        self.bbox.as_ref()
    }

    pub const fn importance(&self) -> f64 {
        self.importance
    }

    pub fn country_code(&self) -> Option<&str> {
        self.country_code.as_deref()
    }

    pub const fn rank_address(&self) -> u8 {
        self.rank_address
    }

    pub fn object_type(&self) -> ObjectType {
        ObjectType::from_rank(self.rank_address)
    }

    pub const fn address_parts(&self) -> &BTreeMap<AddressType, NameMap> {
        &self.address
    }

    pub fn address_part(&self, part: AddressType) -> Option<&NameMap> {
        self.address.get(&part)
    }

    pub const fn context(&self) -> &ContextMap {
        &self.context
    }

    pub const fn centroid(&self) -> Option<&Point> {
        self.centroid.as_ref()
    }

    pub const fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn classification(&self) -> Option<String> {
        classification_string(&self.osm_key, &self.osm_value)
    }

    /// Documents without a name and without a house number cannot be found
    /// by any query and must not be indexed.
    pub fn is_useful_for_index(&self) -> bool {
        self.house_number.is_some() || !self.names.is_empty()
    }

    pub fn with_house_number(&self, house_number: &str) -> Self {
        let mut doc = self.clone();
        doc.house_number = normalize_house_number(Some(house_number));
        doc
    }

    /// Copy whose STREET part is replaced by `street`.
    pub fn with_street(&self, street: NameMap) -> Self {
        let mut doc = self.clone();
        doc.address.insert(AddressType::Street, street);
        doc
    }

    pub fn with_centroid(&self, centroid: Point) -> Self {
        let mut doc = self.clone();
        doc.centroid = Some(centroid);
        doc
    }
}

fn normalize_house_number(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|hn| !hn.is_empty())
        .map(str::to_string)
}

/// Step-wise construction of a [`PlaceDocument`]; `finish` hands out the
/// immutable result.
#[derive(Debug, Clone)]
pub struct PlaceDocumentBuilder {
    doc: PlaceDocument,
}

impl PlaceDocumentBuilder {
    fn new(place_id: i64, osm_type: &str, osm_id: i64, osm_key: &str, osm_value: &str) -> Self {
        let (osm_key, osm_value) = if !is_valid_label(osm_key) {
            (DEFAULT_OSM_KEY, DEFAULT_OSM_VALUE)
        } else if !is_valid_label(osm_value) {
            (osm_key, DEFAULT_OSM_VALUE)
        } else {
            (osm_key, osm_value)
        };

        Self {
            doc: PlaceDocument {
                place_id,
                osm_type: osm_type.to_string(),
                osm_id,
                osm_key: osm_key.to_string(),
                osm_value: osm_value.to_string(),
                names: NameMap::new(),
                house_number: None,
                postcode: None,
                extra_tags: BTreeMap::new(),
                categories: BTreeSet::new(),
                bbox: None,
                importance: 0.0,
                country_code: None,
                rank_address: 30,
                address: BTreeMap::new(),
                context: ContextMap::default(),
                centroid: None,
                geometry: None,
            },
        }
    }

    pub fn names(mut self, names: NameMap) -> Self {
        self.doc.names = names;
        self
    }

    pub fn house_number(mut self, house_number: Option<&str>) -> Self {
        self.doc.house_number = normalize_house_number(house_number);
        self
    }

    pub fn postcode(mut self, postcode: Option<String>) -> Self {
        if postcode.is_some() {
            self.doc.postcode = postcode;
        }
        self
    }

    /// Extra tags; a `place` or `linked_place` tag refines the main tag to
    /// `place=<value>`.
    pub fn extra_tags(mut self, extra_tags: BTreeMap<String, String>) -> Self {
        if let Some(place) = extra_tags
            .get("place")
            .or_else(|| extra_tags.get("linked_place"))
        {
            DEFAULT_OSM_KEY.clone_into(&mut self.doc.osm_key);
            place.clone_into(&mut self.doc.osm_value);
        }
        self.doc.extra_tags = extra_tags;
        self
    }

    /// Categories; malformed entries are dropped.
    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.doc.categories = categories
            .into_iter()
            .filter(|c| is_valid_category(c.as_ref()))
            .map(|c| c.as_ref().to_string())
            .collect();
        self
    }

    pub const fn bbox(mut self, bbox: Option<Envelope>) -> Self {
        if bbox.is_some() {
            self.doc.bbox = bbox;
        }
        self
    }

    pub const fn importance(mut self, importance: f64) -> Self {
        self.doc.importance = importance;
        self
    }

    pub fn country_code(mut self, country_code: Option<&str>) -> Self {
        if let Some(cc) = country_code.filter(|cc| !cc.is_empty()) {
            self.doc.country_code = Some(cc.to_uppercase());
        }
        self
    }

    pub const fn rank_address(mut self, rank: u8) -> Self {
        self.doc.rank_address = rank;
        self
    }

    pub const fn centroid(mut self, centroid: Point) -> Self {
        self.doc.centroid = Some(centroid);
        self
    }

    pub fn geometry(mut self, geometry: Option<Geometry>) -> Self {
        self.doc.geometry = geometry;
        self
    }

    /// Fill address slots from the enclosing places, most specific first.
    ///
    /// A slot keeps the first name it receives. Rows whose slot is taken, or
    /// which describe the document's own level, end up in the context when
    /// they are useful there.
    pub fn address_rows(mut self, rows: &[RawAddressRow], languages: &[String]) -> Self {
        let own_type = self.doc.object_type().address_type();

        for row in rows {
            if row.is_postcode() {
                if let Some(code) = row.name.get("ref").or_else(|| row.name.get("name")) {
                    self.doc.postcode = Some(code.clone());
                }
                continue;
            }

            let names = NameMap::for_place(&row.name, languages);
            if names.is_empty() {
                continue;
            }
            let Some(part) = AddressType::for_address_row(row) else {
                continue;
            };

            let inserted = own_type != Some(part) && !self.doc.address.contains_key(&part);
            if inserted {
                self.doc.address.insert(part, names);
            } else if row.is_useful_for_context() {
                self.doc.context.add_all(&names);
            }
        }
        self
    }

    /// Overlay address parts from raw `addr:*`-style tags (keys without the
    /// `addr:` prefix). These take precedence over computed parts; a replaced
    /// name is kept in the context.
    pub fn address_tags(mut self, tags: &BTreeMap<String, String>, languages: &[String]) -> Self {
        let mut overlay: BTreeMap<AddressType, NameMap> = BTreeMap::new();

        for (key, value) in tags {
            if key == "postcode" {
                self.doc.postcode = Some(value.clone());
                continue;
            }
            let Some((prefix, part)) = ADDRESS_TAG_PREFIXES
                .iter()
                .find(|(prefix, _)| key.starts_with(prefix))
            else {
                continue;
            };

            match part {
                None => {
                    let lang = key.rsplit(':').next().unwrap_or(key);
                    if !key.contains(':') {
                        self.doc.context.add_name(DEFAULT_NAME_KEY, value);
                    } else if languages.iter().any(|l| l == lang) {
                        self.doc.context.add_name(lang, value);
                    }
                }
                Some(part) => {
                    let rest = &key[prefix.len()..];
                    let name_key = if rest.is_empty() {
                        DEFAULT_NAME_KEY
                    } else if let Some(lang) = rest.strip_prefix(':') {
                        if !languages.iter().any(|l| l == lang) {
                            continue;
                        }
                        lang
                    } else {
                        continue;
                    };
                    overlay
                        .entry(*part)
                        .or_default()
                        .insert(name_key.to_string(), value.clone());
                }
            }
        }

        for (part, names) in overlay {
            match self.doc.address.get_mut(&part) {
                None => {
                    self.doc.address.insert(part, names);
                }
                Some(existing) => {
                    for (key, name) in names.0 {
                        match existing.0.get(&key) {
                            Some(old) if *old == name => {}
                            Some(old) => {
                                self.doc.context.add_name(&key, old);
                                existing.0.insert(key, name);
                            }
                            None => {
                                existing.0.insert(key, name);
                            }
                        }
                    }
                }
            }
        }
        self
    }

    /// Names of the document's country.
    pub fn country(mut self, names: Option<NameMap>) -> Self {
        if let Some(names) = names {
            self.doc.address.insert(AddressType::Country, names);
        }
        self
    }

    pub fn finish(self) -> PlaceDocument {
        self.doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs() -> Vec<String> {
        vec!["en".to_string(), "de".to_string()]
    }

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_object_type_from_rank() {
        assert_eq!(ObjectType::from_rank(30), ObjectType::House);
        assert_eq!(ObjectType::from_rank(26), ObjectType::Street);
        assert_eq!(ObjectType::from_rank(22), ObjectType::Locality);
        assert_eq!(ObjectType::from_rank(16), ObjectType::City);
        assert_eq!(ObjectType::from_rank(4), ObjectType::Country);
        assert_eq!(ObjectType::from_rank(2), ObjectType::Other);
        assert_eq!(ObjectType::from_name("county"), Some(ObjectType::County));
        assert_eq!(ObjectType::from_name("planet"), None);
    }

    #[test]
    fn test_name_map_for_place() {
        let names = NameMap::for_place(
            &tags(&[
                ("name", "München"),
                ("name:en", "Munich"),
                ("name:fr", "Munich"),
                ("old_name", "Munichen"),
                ("addr:housename", "Villa"),
            ]),
            &langs(),
        );
        assert_eq!(names.get("default"), Some("München"));
        assert_eq!(names.get("en"), Some("Munich"));
        assert_eq!(names.get("fr"), None);
        assert_eq!(names.get("old"), Some("Munichen"));
        assert_eq!(names.get("housename"), Some("Villa"));
        assert_eq!(names.distinct_values().len(), 4);
    }

    #[test]
    fn test_builder_normalisation() {
        let doc = PlaceDocument::builder(1, "N", 2, "amenity", "bad value!")
            .country_code(Some("de"))
            .house_number(Some("  "))
            .categories(["osm.amenity.cafe", "nodots", "bad.cat!"])
            .finish();

        assert_eq!(doc.osm_key(), "amenity");
        assert_eq!(doc.osm_value(), "yes");
        assert_eq!(doc.country_code(), Some("DE"));
        assert_eq!(doc.house_number(), None);
        assert_eq!(
            doc.categories().iter().collect::<Vec<_>>(),
            vec!["osm.amenity.cafe"]
        );
        assert!(!doc.is_useful_for_index());

        let invalid_key = PlaceDocument::builder(1, "N", 2, "a:b", "c").finish();
        assert_eq!((invalid_key.osm_key(), invalid_key.osm_value()), ("place", "yes"));
    }

    #[test]
    fn test_extra_tags_refine_place() {
        let doc = PlaceDocument::builder(1, "R", 2, "boundary", "administrative")
            .extra_tags(tags(&[("linked_place", "city")]))
            .finish();
        assert_eq!((doc.osm_key(), doc.osm_value()), ("place", "city"));
    }

    #[test]
    fn test_address_rows_fill_free_slots() {
        let rows = vec![
            RawAddressRow {
                place_id: 10,
                name: tags(&[("name", "Mitte")]),
                osm_key: "place".into(),
                osm_value: "suburb".into(),
                rank_address: 20,
            },
            RawAddressRow {
                place_id: 11,
                name: tags(&[("name", "Tiergarten")]),
                osm_key: "boundary".into(),
                osm_value: "administrative".into(),
                rank_address: 19,
            },
            RawAddressRow {
                place_id: 12,
                name: tags(&[("ref", "10117")]),
                osm_key: "place".into(),
                osm_value: "postcode".into(),
                rank_address: 21,
            },
        ];
        let doc = PlaceDocument::builder(1, "N", 2, "amenity", "cafe")
            .address_rows(&rows, &langs())
            .finish();

        assert_eq!(
            doc.address_part(AddressType::District).and_then(|n| n.get("default")),
            Some("Mitte")
        );
        assert_eq!(doc.context().names("default").collect::<Vec<_>>(), vec!["Tiergarten"]);
        assert_eq!(doc.postcode(), Some("10117"));
    }

    #[test]
    fn test_address_tags_overlay_keeps_superseded_name() {
        let doc = PlaceDocument::builder(1, "N", 2, "amenity", "cafe")
            .address_rows(
                &[RawAddressRow {
                    place_id: 5,
                    name: tags(&[("name", "Old Street")]),
                    osm_key: "highway".into(),
                    osm_value: "residential".into(),
                    rank_address: 26,
                }],
                &langs(),
            )
            .address_tags(
                &tags(&[
                    ("street", "New Street"),
                    ("city:de", "Köln"),
                    ("city:xx", "Ignored"),
                    ("hamlet", "Smallville"),
                    ("postcode", "50667"),
                    ("streetnumber", "3"),
                ]),
                &langs(),
            )
            .finish();

        let street = doc.address_part(AddressType::Street).unwrap();
        assert_eq!(street.get("default"), Some("New Street"));
        assert_eq!(
            doc.address_part(AddressType::City).and_then(|n| n.get("de")),
            Some("Köln")
        );
        assert_eq!(doc.address_part(AddressType::City).unwrap().len(), 1);
        let context: Vec<_> = doc.context().names("default").collect();
        assert_eq!(context, vec!["Old Street", "Smallville"]);
        assert_eq!(doc.postcode(), Some("50667"));
    }

    #[test]
    fn test_document_ids() {
        assert_eq!(document_id(42, 0), "42");
        assert_eq!(document_id(42, 3), "42.3");
        assert_eq!(parse_document_id("42"), Some((42, 0)));
        assert_eq!(parse_document_id("42.3"), Some((42, 3)));
        assert_eq!(parse_document_id("x.3"), None);
    }

    #[test]
    fn test_variants_do_not_alias_base() {
        let base = PlaceDocument::builder(1, "N", 2, "building", "yes")
            .address_tags(&tags(&[("street", "Main St")]), &langs())
            .finish();
        let variant = base.with_street(NameMap::new().with("default", "Other St"));

        assert_eq!(
            base.address_part(AddressType::Street).and_then(|n| n.get("default")),
            Some("Main St")
        );
        assert_eq!(
            variant.address_part(AddressType::Street).and_then(|n| n.get("default")),
            Some("Other St")
        );
    }

    #[test]
    fn test_classification_string() {
        assert_eq!(
            classification_string("amenity", "cafe").as_deref(),
            Some("#osm.amenity.cafe")
        );
        assert_eq!(classification_string("amenity", "ca fe"), None);
        assert!(is_valid_category("osm.amenity"));
        assert!(!is_valid_category("osm"));
        assert!(!is_valid_category("osm..x"));
    }
}
