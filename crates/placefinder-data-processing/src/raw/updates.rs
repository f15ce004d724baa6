//! Pending place updates.
//!
//! The update log is a comma-separated file `place_id,operation,indexed_date`
//! with RFC 3339 timestamps. A place may appear several times; only its
//! newest entry matters.

use std::path::Path;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::Result;
use crate::DataError;

const UPDATE_LOG_SCHEMA: [(PlSmallStr, DataType); 3] = [
    (PlSmallStr::from_static("place_id"), DataType::Int64),
    (PlSmallStr::from_static("operation"), DataType::String),
    (PlSmallStr::from_static("indexed_date"), DataType::String),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOperation {
    Upsert,
    Delete,
}

impl UpdateOperation {
    fn parse(text: &str) -> Self {
        if text.eq_ignore_ascii_case("delete") {
            Self::Delete
        } else {
            Self::Upsert
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceUpdate {
    pub place_id: i64,
    pub operation: UpdateOperation,
    pub indexed_date: DateTime<Utc>,
}

impl PlaceUpdate {
    pub const fn is_delete(&self) -> bool {
        matches!(self.operation, UpdateOperation::Delete)
    }
}

#[instrument(name = "Read update log", skip_all, level = "info")]
pub fn read_update_log(path: impl AsRef<Path>) -> Result<Vec<PlaceUpdate>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DataError::RequiredFilesNotFound(path.to_path_buf()));
    }

    let df = LazyCsvReader::new(path)
        .with_separator(b',')
        .with_has_header(true)
        .with_schema(Some(Schema::from_iter(UPDATE_LOG_SCHEMA).into()))
        .finish()?
        .collect()?;

    let place_ids = df.column("place_id")?.i64()?;
    let operations = df.column("operation")?.str()?;
    let dates = df.column("indexed_date")?.str()?;

    let mut updates = Vec::with_capacity(df.height());
    for (row, (place_id, operation, date)) in
        itertools::izip!(place_ids, operations, dates).enumerate()
    {
        let (Some(place_id), Some(date)) = (place_id, date) else {
            return Err(DataError::InvalidRecord {
                row,
                reason: "place_id and indexed_date are required".to_string(),
            });
        };
        let indexed_date = DateTime::parse_from_rfc3339(date.trim())?.with_timezone(&Utc);
        updates.push(PlaceUpdate {
            place_id,
            operation: UpdateOperation::parse(operation.unwrap_or_default()),
            indexed_date,
        });
    }

    info!(entries = updates.len(), "Read update log");
    Ok(updates)
}

/// Keep only the newest update per place, ordered by place id.
pub fn collapse_updates(updates: Vec<PlaceUpdate>) -> Vec<PlaceUpdate> {
    updates
        .into_iter()
        .sorted_by(|a, b| {
            a.place_id
                .cmp(&b.place_id)
                .then_with(|| b.indexed_date.cmp(&a.indexed_date))
        })
        .dedup_by(|a, b| a.place_id == b.place_id)
        .collect()
}
