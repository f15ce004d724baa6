//! Expansion of a place into one document per house number.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{AddressType, DEFAULT_NAME_KEY, NameMap, PlaceDocument};
use crate::config::RelevanceParams;

/// Values with a run of three or more non-digit characters between commas
/// are free text, not house numbers.
static FREE_TEXT_GUARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\A|.*,)[^\d,]{3,}(,.*|\z)").expect("valid house number guard")
});

static HOUSE_NUMBER_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[;,]\s*").expect("valid house number separator"));

/// Split a raw house-number field into individual numbers.
///
/// Returns nothing when the value looks like free text. Otherwise tokens are
/// trimmed and empty or overlong ones dropped.
pub fn parse_house_numbers(value: &str, max_len: usize) -> Vec<&str> {
    if value.trim().is_empty() || FREE_TEXT_GUARD.is_match(value) {
        return Vec::new();
    }
    HOUSE_NUMBER_SPLIT
        .split(value)
        .map(str::trim)
        .filter(|hnr| !hnr.is_empty() && hnr.chars().count() < max_len)
        .collect()
}

fn non_blank<'a>(address: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    address
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

fn house_numbers<'a>(
    address: &'a BTreeMap<String, String>,
    key: &str,
    params: &RelevanceParams,
) -> Vec<&'a str> {
    address
        .get(key)
        .map(|value| parse_house_numbers(value, params.house_number_max_len))
        .unwrap_or_default()
}

fn street_names(name: &str) -> NameMap {
    NameMap::new().with(DEFAULT_NAME_KEY, name)
}

/// Turn a base document and its raw address tags into the documents to
/// index.
///
/// Conscription numbers are attached to the `place` name and street numbers
/// to the street, both possibly on the same object. Only when neither applies
/// is the plain `housenumber` used, with a block number or a street-less
/// `place` standing in for the street. Without any house number the base
/// document is returned alone if it is indexable.
pub fn expand_address(
    base: &PlaceDocument,
    address: &BTreeMap<String, String>,
    params: &RelevanceParams,
) -> Vec<PlaceDocument> {
    let mut docs = Vec::new();
    let place = non_blank(address, "place");

    if let Some(place) = place {
        let numbers = house_numbers(address, "conscriptionnumber", params);
        if !numbers.is_empty() {
            let variant = base.with_street(street_names(place));
            docs.extend(numbers.into_iter().map(|hnr| variant.with_house_number(hnr)));
        }
    }

    let has_street = non_blank(address, "street").is_some()
        || base.address_part(AddressType::Street).is_some();
    if has_street {
        docs.extend(
            house_numbers(address, "streetnumber", params)
                .into_iter()
                .map(|hnr| base.with_house_number(hnr)),
        );
    }

    if docs.is_empty() {
        let numbers = house_numbers(address, "housenumber", params);
        if !numbers.is_empty() {
            let street_override = non_blank(address, "block_number").or_else(|| {
                place.filter(|_| non_blank(address, "street").is_none())
            });
            let variant = match street_override {
                Some(name) => base.with_street(street_names(name)),
                None => base.clone(),
            };
            docs.extend(numbers.into_iter().map(|hnr| variant.with_house_number(hnr)));
        }
    }

    if docs.is_empty() && base.is_useful_for_index() {
        docs.push(base.clone());
    }
    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> PlaceDocument {
        PlaceDocument::builder(10000, "N", 123, "place", "house")
            .country_code(Some("de"))
            .rank_address(30)
            .address_tags(
                &address(&[("street", "Chaussee"), ("city", "Hamburg")]),
                &[],
            )
            .finish()
    }

    fn address(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn street(doc: &PlaceDocument) -> Option<&str> {
        doc.address_part(AddressType::Street)
            .and_then(|n| n.get("default"))
    }

    fn expand(pairs: &[(&str, &str)]) -> Vec<PlaceDocument> {
        expand_address(&base(), &address(pairs), &RelevanceParams::default())
    }

    #[test]
    fn test_parse_house_numbers() {
        assert_eq!(parse_house_numbers("34;; 50 b;", 20), vec!["34", "50 b"]);
        assert_eq!(parse_house_numbers("1 , 3,5", 20), vec!["1", "3", "5"]);
        assert!(parse_house_numbers("something bad", 20).is_empty());
        assert!(parse_house_numbers("14, portsmith", 20).is_empty());
        assert!(parse_house_numbers("   ", 20).is_empty());
        assert!(parse_house_numbers("12345678901234567890", 20).is_empty());
        assert_eq!(parse_house_numbers("12a", 20), vec!["12a"]);
    }

    #[test]
    fn test_unnamed_without_number_is_dropped() {
        assert!(expand(&[]).is_empty());
        assert!(expand(&[("city", "a"), ("street", "s"), ("place", "p")]).is_empty());
    }

    #[test]
    fn test_named_without_number_is_kept() {
        let named = PlaceDocument::builder(1, "N", 2, "amenity", "cafe")
            .names(NameMap::new().with("default", "foo"))
            .finish();
        let docs = expand_address(&named, &BTreeMap::new(), &RelevanceParams::default());
        assert_eq!(docs, vec![named]);
    }

    #[test]
    fn test_simple_house_number_list() {
        let docs = expand(&[("housenumber", "34;; 50 b;")]);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].house_number(), Some("34"));
        assert_eq!(docs[1].house_number(), Some("50 b"));
        assert!(docs.iter().all(|d| street(d) == Some("Chaussee")));
        assert!(docs.iter().all(|d| d.place_id() == 10000));
    }

    #[test]
    fn test_free_text_house_number_emits_nothing() {
        assert!(expand(&[("housenumber", "something bad")]).is_empty());
    }

    #[test]
    fn test_conscription_and_street_numbers() {
        let docs = expand(&[
            ("housenumber", "34/50"),
            ("conscriptionnumber", "50"),
            ("streetnumber", "34"),
            ("place", "Nowhere"),
        ]);
        assert_eq!(docs.len(), 2);
        assert_eq!((docs[0].house_number(), street(&docs[0])), (Some("50"), Some("Nowhere")));
        assert_eq!((docs[1].house_number(), street(&docs[1])), (Some("34"), Some("Chaussee")));
        assert_eq!(
            docs[0]
                .address_part(AddressType::City)
                .and_then(|n| n.get("default")),
            Some("Hamburg")
        );
    }

    #[test]
    fn test_block_number_replaces_street() {
        let docs = expand(&[("housenumber", "1"), ("block_number", "12"), ("street", "Main")]);
        assert_eq!(docs.len(), 1);
        assert_eq!(street(&docs[0]), Some("12"));
    }

    #[test]
    fn test_place_replaces_street_only_without_street() {
        let docs = expand(&[("housenumber", "7"), ("place", "Nowhere")]);
        assert_eq!(street(&docs[0]), Some("Nowhere"));

        let docs = expand(&[("housenumber", "7"), ("place", "Nowhere"), ("street", "Main")]);
        assert_eq!(street(&docs[0]), Some("Chaussee"));
    }

    #[test]
    fn test_variants_leave_base_untouched() {
        let base = base();
        let docs = expand_address(
            &base,
            &address(&[("housenumber", "1"), ("block_number", "12")]),
            &RelevanceParams::default(),
        );
        assert_eq!(street(&docs[0]), Some("12"));
        assert_eq!(street(&base), Some("Chaussee"));
        assert_eq!(base.house_number(), None);
    }
}
