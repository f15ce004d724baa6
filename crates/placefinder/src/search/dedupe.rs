//! Collapsing of duplicate street results.
//!
//! Long streets are often split into several ways that share name and
//! postcode. Only the best-ranked of them is kept.

use ahash::AHashSet as HashSet;

use crate::index::RankedHit;

/// Drop every street hit whose `(postcode, name)` pair was already seen.
///
/// Hits that are not streets, or lack a postcode or a name, pass through.
/// For Dutch output the postcode key keeps only its digits, so that
/// `1017 GC` and `1017 GD` collapse.
pub fn remove_duplicate_streets(hits: Vec<RankedHit>, language: &str) -> Vec<RankedHit> {
    let mut seen = HashSet::new();
    hits.into_iter()
        .filter(|hit| match street_key(hit, language) {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect()
}

fn street_key(hit: &RankedHit, language: &str) -> Option<String> {
    if hit.record.osm_key != "highway" {
        return None;
    }
    let postcode = hit.record.postcode.as_deref()?;
    let name = hit.localized("name", language)?;
    let postcode = if language == "nl" {
        postcode.chars().filter(char::is_ascii_digit).collect()
    } else {
        postcode.to_string()
    };
    Some(format!("{postcode}:{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{IndexRecord, NameMap, PlaceDocument, RecordContext};

    fn hit(id: &str, key: &str, name: Option<&str>, postcode: Option<&str>) -> RankedHit {
        let mut builder = PlaceDocument::builder(1, "W", 1, key, "residential")
            .rank_address(26)
            .postcode(postcode.map(str::to_string));
        if let Some(name) = name {
            builder = builder.names(NameMap::new().with("default", name));
        }
        RankedHit {
            id: id.to_string(),
            score: 1.0,
            record: IndexRecord::from_document(id.to_string(), &builder.finish(), &RecordContext::default()),
        }
    }

    fn ids(hits: &[RankedHit]) -> Vec<&str> {
        hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn test_streets_collapse_by_postcode_and_name() {
        let hits = vec![
            hit("1", "highway", Some("Kerkstraat"), Some("1017 GC")),
            hit("2", "highway", Some("Kerkstraat"), Some("1017 GC")),
            hit("3", "highway", Some("Kerkstraat"), Some("1017 GD")),
            hit("4", "highway", Some("Kerkstraat"), None),
            hit("5", "highway", Some("Kerkstraat"), None),
            hit("6", "amenity", Some("Kerkstraat"), Some("1017 GC")),
        ];
        assert_eq!(ids(&remove_duplicate_streets(hits, "default")), vec!["1", "3", "4", "5", "6"]);
    }

    #[test]
    fn test_dutch_postcodes_compare_digits_only() {
        let hits = vec![
            hit("1", "highway", Some("Kerkstraat"), Some("1017 GC")),
            hit("2", "highway", Some("Kerkstraat"), Some("1017 GD")),
            hit("3", "highway", Some("Damrak"), Some("1017 GD")),
        ];
        assert_eq!(ids(&remove_duplicate_streets(hits, "nl")), vec!["1", "3"]);
    }

    #[test]
    fn test_unnamed_streets_are_kept() {
        let hits = vec![
            hit("1", "highway", None, Some("10117")),
            hit("2", "highway", None, Some("10117")),
        ];
        assert_eq!(remove_duplicate_streets(hits, "de").len(), 2);
    }
}
