//! Source-side data handling for the placefinder geocoding engine.
//!
//! Raw places come from an external store through the [`PlaceSource`]
//! trait. [`PlaceDump`] implements it over a tab-separated dump file read
//! with polars; [`updates`] reads the log of pending incremental changes.

pub mod geo;
pub mod raw;
pub mod test_data;

mod error;

pub use error::{DataError, Result};
pub use geo::{Envelope, Geometry, LineString, Point};
pub use raw::dump::{PlaceDump, write_records};
pub use raw::updates::{self, PlaceUpdate, UpdateOperation, collapse_updates, read_update_log};
pub use raw::{InterpolationRange, PlaceSource, RawAddressRow, RawPlaceRecord};
