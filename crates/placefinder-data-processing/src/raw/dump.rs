//! Tab-separated place dumps.
//!
//! One header row, then one place per line. Map and list columns hold JSON,
//! empty cells are nulls. Reads go through polars lazy frames so that a
//! country partition only materialises its own rows.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use itertools::izip;
use polars::prelude::*;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use super::{InterpolationRange, PlaceSource, RawAddressRow, RawPlaceRecord, Result};
use crate::DataError;
use crate::geo::{Geometry, Point};

const PLACE_DUMP_SCHEMA: [(PlSmallStr, DataType); 22] = [
    (PlSmallStr::from_static("place_id"), DataType::Int64),
    (PlSmallStr::from_static("osm_type"), DataType::String),
    (PlSmallStr::from_static("osm_id"), DataType::Int64),
    (PlSmallStr::from_static("class"), DataType::String),
    (PlSmallStr::from_static("type"), DataType::String),
    (PlSmallStr::from_static("name"), DataType::String),
    (PlSmallStr::from_static("address"), DataType::String),
    (PlSmallStr::from_static("extratags"), DataType::String),
    (PlSmallStr::from_static("lon"), DataType::Float64),
    (PlSmallStr::from_static("lat"), DataType::Float64),
    (PlSmallStr::from_static("geometry"), DataType::String),
    (PlSmallStr::from_static("importance"), DataType::Float64),
    (PlSmallStr::from_static("rank_search"), DataType::Int32),
    (PlSmallStr::from_static("rank_address"), DataType::Int32),
    (PlSmallStr::from_static("country_code"), DataType::String),
    (PlSmallStr::from_static("postcode"), DataType::String),
    (PlSmallStr::from_static("linked_place_id"), DataType::Int64),
    (PlSmallStr::from_static("categories"), DataType::String),
    (PlSmallStr::from_static("addresslines"), DataType::String),
    (PlSmallStr::from_static("startnumber"), DataType::Int64),
    (PlSmallStr::from_static("endnumber"), DataType::Int64),
    (PlSmallStr::from_static("step"), DataType::Int64),
];

/// A place dump on disk, usable as a [`PlaceSource`].
#[derive(Debug, Clone)]
pub struct PlaceDump {
    path: PathBuf,
}

impl PlaceDump {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(DataError::RequiredFilesNotFound(path));
        }
        info!(path = %path.display(), "Opened place dump");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lazy_frame(&self) -> Result<LazyFrame> {
        Ok(LazyCsvReader::new(&self.path)
            .with_separator(b'\t')
            .with_has_header(true)
            .with_quote_char(None)
            .with_schema(Some(Schema::from_iter(PLACE_DUMP_SCHEMA).into()))
            .finish()?
            .with_column(
                col("country_code")
                    .fill_null(lit(""))
                    .str()
                    .to_lowercase(),
            ))
    }
}

impl PlaceSource for PlaceDump {
    #[instrument(name = "List dump countries", skip_all, level = "debug")]
    fn country_codes(&self) -> Result<Vec<String>> {
        let df = self
            .lazy_frame()?
            .select([col("country_code")])
            .collect()?;

        let codes: BTreeSet<String> = df
            .column("country_code")?
            .str()?
            .into_iter()
            .map(|cc| cc.unwrap_or_default().to_string())
            .collect();
        debug!(countries = codes.len(), "Found countries in dump");
        Ok(codes.into_iter().collect())
    }

    #[instrument(name = "Read dump country", skip(self), level = "debug")]
    fn places_for_country(&self, country_code: &str) -> Result<Vec<RawPlaceRecord>> {
        let df = self
            .lazy_frame()?
            .filter(col("country_code").eq(lit(country_code.to_lowercase())))
            .collect()?;
        records_from_frame(&df)
    }

    fn place_by_id(&self, place_id: i64) -> Result<Option<RawPlaceRecord>> {
        let df = self
            .lazy_frame()?
            .filter(col("place_id").eq(lit(place_id)))
            .limit(1)
            .collect()?;
        Ok(records_from_frame(&df)?.into_iter().next())
    }

    fn country_names(&self, country_code: &str) -> Result<Option<BTreeMap<String, String>>> {
        let df = self
            .lazy_frame()?
            .filter(
                col("country_code")
                    .eq(lit(country_code.to_lowercase()))
                    .and(col("rank_address").eq(lit(4)))
                    .and(col("class").eq(lit("boundary"))),
            )
            .select([col("name")])
            .limit(1)
            .collect()?;

        match df.column("name")?.str()?.get(0) {
            Some(names) => Ok(Some(parse_json(Some(names))?)),
            None => Ok(None),
        }
    }
}

fn parse_json<T: DeserializeOwned + Default>(value: Option<&str>) -> Result<T> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() && text != "null" => Ok(serde_json::from_str(text)?),
        _ => Ok(T::default()),
    }
}

fn records_from_frame(df: &DataFrame) -> Result<Vec<RawPlaceRecord>> {
    let place_id = df.column("place_id")?.i64()?;
    let osm_type = df.column("osm_type")?.str()?;
    let osm_id = df.column("osm_id")?.i64()?;
    let class = df.column("class")?.str()?;
    let value = df.column("type")?.str()?;
    let name = df.column("name")?.str()?;
    let address = df.column("address")?.str()?;
    let extratags = df.column("extratags")?.str()?;
    let lon = df.column("lon")?.f64()?;
    let lat = df.column("lat")?.f64()?;
    let geometry = df.column("geometry")?.str()?;
    let importance = df.column("importance")?.f64()?;
    let rank_search = df.column("rank_search")?.i32()?;
    let rank_address = df.column("rank_address")?.i32()?;
    let country_code = df.column("country_code")?.str()?;
    let postcode = df.column("postcode")?.str()?;
    let linked_place_id = df.column("linked_place_id")?.i64()?;
    let categories = df.column("categories")?.str()?;
    let addresslines = df.column("addresslines")?.str()?;
    let startnumber = df.column("startnumber")?.i64()?;
    let endnumber = df.column("endnumber")?.i64()?;
    let step = df.column("step")?.i64()?;

    let mut records = Vec::with_capacity(df.height());
    for (
        (pid, osm_type, osm_id, class, value, name, address, extratags),
        (lon, lat, geometry, importance, rank_search, rank_address, country_code),
        (postcode, linked, categories, addresslines, start, end, step),
    ) in izip!(
        izip!(place_id, osm_type, osm_id, class, value, name, address, extratags),
        izip!(lon, lat, geometry, importance, rank_search, rank_address, country_code),
        izip!(postcode, linked_place_id, categories, addresslines, startnumber, endnumber, step),
    ) {
        let Some(pid) = pid else {
            warn!("Skipping dump row without place_id");
            continue;
        };

        let geometry = match geometry.filter(|g| !g.is_empty()) {
            Some(text) => match Geometry::from_geojson(text) {
                Ok(geom) => Some(geom),
                Err(e) => {
                    warn!(place_id = pid, error = %e, "Could not parse geometry");
                    None
                }
            },
            None => None,
        };

        let interpolation = match (start, end) {
            (Some(first), Some(last)) => Some(InterpolationRange {
                first,
                last,
                step: step.unwrap_or(1),
            }),
            _ => None,
        };

        records.push(RawPlaceRecord {
            place_id: pid,
            osm_type: osm_type.unwrap_or("N").to_string(),
            osm_id: osm_id.unwrap_or_default(),
            osm_key: class.unwrap_or("place").to_string(),
            osm_value: value.unwrap_or("yes").to_string(),
            names: parse_json(name)?,
            address: parse_json(address)?,
            extra_tags: parse_json(extratags)?,
            centroid: lon.zip(lat).map(|(lon, lat)| Point::new(lon, lat)),
            geometry,
            bbox: None,
            importance,
            rank_search: rank_search.map(|r| r.clamp(0, 30) as u8),
            rank_address: rank_address.unwrap_or(30).clamp(0, 30) as u8,
            country_code: country_code
                .filter(|cc| !cc.is_empty())
                .map(str::to_string),
            postcode: postcode.map(str::to_string),
            linked_place_id: linked,
            categories: parse_json(categories)?,
            address_rows: parse_json::<Vec<RawAddressRow>>(addresslines)?,
            interpolation,
        });
    }

    Ok(records)
}

fn clean(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ")
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write records in dump format, header included.
pub fn write_records<W: Write>(mut writer: W, records: &[RawPlaceRecord]) -> Result<()> {
    let header = PLACE_DUMP_SCHEMA
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join("\t");
    writeln!(writer, "{header}")?;

    for record in records {
        let geometry = record
            .geometry
            .as_ref()
            .map(Geometry::to_geojson)
            .transpose()?;
        let fields = [
            record.place_id.to_string(),
            clean(&record.osm_type),
            record.osm_id.to_string(),
            clean(&record.osm_key),
            clean(&record.osm_value),
            serde_json::to_string(&record.names)?,
            serde_json::to_string(&record.address)?,
            serde_json::to_string(&record.extra_tags)?,
            opt(record.centroid.map(|c| c.lon)),
            opt(record.centroid.map(|c| c.lat)),
            geometry.unwrap_or_default(),
            opt(record.importance),
            opt(record.rank_search),
            record.rank_address.to_string(),
            record.country_code.as_deref().map(clean).unwrap_or_default(),
            record.postcode.as_deref().map(clean).unwrap_or_default(),
            opt(record.linked_place_id),
            serde_json::to_string(&record.categories)?,
            serde_json::to_string(&record.address_rows)?,
            opt(record.interpolation.map(|i| i.first)),
            opt(record.interpolation.map(|i| i.last)),
            opt(record.interpolation.map(|i| i.step)),
        ];
        writeln!(writer, "{}", fields.join("\t"))?;
    }

    writer.flush()?;
    Ok(())
}
