use std::collections::BTreeMap;
use std::io::Write;

use tempfile::NamedTempFile;
use tracing::info;

use super::error::Result;
use crate::geo::{Geometry, Point};
use crate::raw::dump::write_records;
use crate::raw::{InterpolationRange, RawAddressRow, RawPlaceRecord};

/// Configuration for test data generation
#[derive(Debug, Clone)]
pub struct TestDataConfig {
    /// Also write house numbers, interpolations, POIs and a second country
    pub realistic_data: bool,
}

impl Default for TestDataConfig {
    fn default() -> Self {
        Self::sample()
    }
}

impl TestDataConfig {
    /// A country, a city and one street
    pub fn minimal() -> Self {
        Self {
            realistic_data: false,
        }
    }

    /// Sample data for integration tests
    pub fn sample() -> Self {
        Self {
            realistic_data: true,
        }
    }
}

fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn city_row() -> RawAddressRow {
    RawAddressRow {
        place_id: 1001,
        name: tags(&[("name", "Berlin"), ("name:en", "Berlin")]),
        osm_key: "place".to_string(),
        osm_value: "city".to_string(),
        rank_address: 16,
    }
}

fn street_row() -> RawAddressRow {
    RawAddressRow {
        place_id: 1002,
        name: tags(&[("name", "Hauptstraße")]),
        osm_key: "highway".to_string(),
        osm_value: "residential".to_string(),
        rank_address: 26,
    }
}

/// The places written by [`create_test_dump`].
pub fn test_records(config: &TestDataConfig) -> Vec<RawPlaceRecord> {
    let mut records = vec![
        RawPlaceRecord {
            place_id: 1000,
            osm_type: "R".to_string(),
            osm_id: 51477,
            osm_key: "boundary".to_string(),
            osm_value: "administrative".to_string(),
            names: tags(&[("name", "Deutschland"), ("name:en", "Germany"), ("name:de", "Deutschland")]),
            centroid: Some(Point::new(10.45, 51.16)),
            importance: Some(0.9),
            rank_address: 4,
            country_code: Some("DE".to_string()),
            ..Default::default()
        },
        RawPlaceRecord {
            place_id: 1001,
            osm_type: "R".to_string(),
            osm_id: 62422,
            osm_key: "place".to_string(),
            osm_value: "city".to_string(),
            names: tags(&[("name", "Berlin"), ("name:en", "Berlin")]),
            centroid: Some(Point::new(13.405, 52.52)),
            importance: Some(0.8),
            rank_address: 16,
            country_code: Some("DE".to_string()),
            postcode: Some("10117".to_string()),
            ..Default::default()
        },
        RawPlaceRecord {
            place_id: 1002,
            osm_type: "W".to_string(),
            osm_id: 4001,
            osm_key: "highway".to_string(),
            osm_value: "residential".to_string(),
            names: tags(&[("name", "Hauptstraße")]),
            centroid: Some(Point::new(13.401, 52.521)),
            geometry: Some(Geometry::LineString(vec![[13.400, 52.521], [13.402, 52.521]])),
            importance: Some(0.1),
            rank_address: 26,
            country_code: Some("DE".to_string()),
            postcode: Some("10117".to_string()),
            address_rows: vec![city_row()],
            ..Default::default()
        },
    ];

    if config.realistic_data {
        records.extend([
            RawPlaceRecord {
                place_id: 1003,
                osm_type: "N".to_string(),
                osm_id: 5001,
                osm_key: "building".to_string(),
                osm_value: "yes".to_string(),
                address: tags(&[("street", "Hauptstraße"), ("housenumber", "1;3")]),
                centroid: Some(Point::new(13.4005, 52.5211)),
                rank_address: 30,
                rank_search: Some(30),
                country_code: Some("DE".to_string()),
                postcode: Some("10117".to_string()),
                address_rows: vec![street_row(), city_row()],
                ..Default::default()
            },
            RawPlaceRecord {
                place_id: 1004,
                osm_type: "W".to_string(),
                osm_id: 4002,
                osm_key: "place".to_string(),
                osm_value: "house_number".to_string(),
                geometry: Some(Geometry::LineString(vec![[13.400, 52.522], [13.402, 52.522]])),
                rank_address: 30,
                country_code: Some("DE".to_string()),
                address_rows: vec![street_row(), city_row()],
                interpolation: Some(InterpolationRange {
                    first: 2,
                    last: 10,
                    step: 2,
                }),
                ..Default::default()
            },
            RawPlaceRecord {
                place_id: 1005,
                osm_type: "N".to_string(),
                osm_id: 5002,
                osm_key: "amenity".to_string(),
                osm_value: "restaurant".to_string(),
                names: tags(&[("name", "Zur Post")]),
                extra_tags: tags(&[("cuisine", "german"), ("wheelchair", "yes")]),
                centroid: Some(Point::new(13.4012, 52.5212)),
                importance: Some(0.05),
                rank_address: 30,
                country_code: Some("DE".to_string()),
                address_rows: vec![street_row(), city_row()],
                ..Default::default()
            },
            RawPlaceRecord {
                place_id: 1006,
                osm_type: "N".to_string(),
                osm_id: 5003,
                osm_key: "place".to_string(),
                osm_value: "city".to_string(),
                names: tags(&[("name", "Berlin")]),
                centroid: Some(Point::new(13.405, 52.52)),
                rank_address: 16,
                country_code: Some("DE".to_string()),
                linked_place_id: Some(1001),
                ..Default::default()
            },
            RawPlaceRecord {
                place_id: 2000,
                osm_type: "R".to_string(),
                osm_id: 47796,
                osm_key: "boundary".to_string(),
                osm_value: "administrative".to_string(),
                names: tags(&[("name", "Nederland"), ("name:en", "Netherlands")]),
                centroid: Some(Point::new(5.29, 52.13)),
                importance: Some(0.85),
                rank_address: 4,
                country_code: Some("NL".to_string()),
                ..Default::default()
            },
            RawPlaceRecord {
                place_id: 2001,
                osm_type: "W".to_string(),
                osm_id: 6001,
                osm_key: "highway".to_string(),
                osm_value: "residential".to_string(),
                names: tags(&[("name", "Kerkstraat")]),
                centroid: Some(Point::new(4.89, 52.37)),
                importance: Some(0.1),
                rank_address: 26,
                country_code: Some("NL".to_string()),
                postcode: Some("1017 GC".to_string()),
                ..Default::default()
            },
        ]);
    }

    records
}

/// Create a place dump in a temporary file
pub fn create_test_dump(config: &TestDataConfig) -> Result<NamedTempFile> {
    info!("Creating test dump with config: {:?}", config);

    let mut file = NamedTempFile::new()?;
    write_records(&mut file, &test_records(config))?;
    file.flush()?;
    Ok(file)
}
