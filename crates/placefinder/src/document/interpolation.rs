//! House numbers interpolated along an address line.

use placefinder_data_processing::{InterpolationRange, LineString};

use super::PlaceDocument;
use crate::config::RelevanceParams;

/// One document per interpolated house number, placed at evenly spaced
/// positions along `line`.
///
/// A single-number range sits at the line's centroid. Reversed ranges,
/// ranges that are too wide and steps that are too large or below one yield
/// nothing.
pub fn interpolate(
    base: &PlaceDocument,
    range: InterpolationRange,
    line: &LineString,
    params: &RelevanceParams,
) -> Vec<PlaceDocument> {
    let InterpolationRange { first, last, step } = range;

    if first == last {
        return line
            .centroid()
            .map(|c| base.with_house_number(&first.to_string()).with_centroid(c))
            .into_iter()
            .collect();
    }

    let span = last - first;
    if span <= 0
        || span >= params.interpolation_max_span
        || step < 1
        || step >= params.interpolation_max_step
    {
        return Vec::new();
    }

    let index_step = line.length() / span as f64;
    (0..=span)
        .step_by(step as usize)
        .filter_map(|offset| {
            line.point_at(index_step * offset as f64).map(|point| {
                base.with_house_number(&(first + offset).to_string())
                    .with_centroid(point)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use placefinder_data_processing::Point;

    fn base() -> PlaceDocument {
        PlaceDocument::builder(10000, "N", 123, "place", "house")
            .country_code(Some("de"))
            .finish()
    }

    fn line() -> LineString {
        LineString::new(vec![Point::new(2.5, 0.0), Point::new(2.5, 0.1)])
    }

    fn run(first: i64, last: i64, step: i64) -> Vec<PlaceDocument> {
        interpolate(
            &base(),
            InterpolationRange { first, last, step },
            &line(),
            &RelevanceParams::default(),
        )
    }

    fn assert_at(doc: &PlaceDocument, hnr: &str, lat: f64) {
        assert_eq!(doc.house_number(), Some(hnr));
        let c = doc.centroid().unwrap();
        assert!((c.lon - 2.5).abs() < 1e-7);
        assert!((c.lat - lat).abs() < 1e-7, "{hnr}: {} != {lat}", c.lat);
    }

    #[test]
    fn test_bad_ranges_yield_nothing() {
        assert!(run(34, 33, 1).is_empty());
        assert!(run(1, 2000, 1).is_empty());
        assert!(run(1, 10, 10).is_empty());
        assert!(run(1, 10, 0).is_empty());
    }

    #[test]
    fn test_single_point() {
        let docs = run(2000, 2000, 1);
        assert_eq!(docs.len(), 1);
        assert_at(&docs[0], "2000", 0.05);
    }

    #[test]
    fn test_single_step() {
        let docs = run(1, 3, 1);
        assert_eq!(docs.len(), 3);
        assert_at(&docs[0], "1", 0.0);
        assert_at(&docs[1], "2", 0.05);
        assert_at(&docs[2], "3", 0.1);
    }

    #[test]
    fn test_two_step() {
        let docs = run(16, 20, 2);
        assert_eq!(docs.len(), 3);
        assert_at(&docs[0], "16", 0.0);
        assert_at(&docs[1], "18", 0.05);
        assert_at(&docs[2], "20", 0.1);
    }

    #[test]
    fn test_count_and_points_on_line() {
        let line = LineString::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 2.0),
        ]);
        for (first, last, step) in [(1, 100, 3), (2, 598, 9), (10, 11, 1), (5, 12, 4)] {
            let docs = interpolate(
                &base(),
                InterpolationRange { first, last, step },
                &line,
                &RelevanceParams::default(),
            );
            assert_eq!(docs.len() as i64, (last - first) / step + 1);
            for doc in &docs {
                assert!(line.distance_to(doc.centroid().unwrap()) < 1e-9);
            }
        }
    }
}
