//! Text analysis shared by the index adapters.
//!
//! Free text is split on non-alphanumeric characters, lowercased and folded
//! to ASCII. Keyword fields keep the whole value as one token with the same
//! normalization. Prefix fields (`*.prefix`, `*.ngram`) are indexed as edge
//! n-grams of each token.

use once_cell::sync::Lazy;
use tantivy::tokenizer::{
    AsciiFoldingFilter, LowerCaser, RawTokenizer, RemoveLongFilter, SimpleTokenizer, TextAnalyzer,
    TokenStream,
};

/// Tokens longer than this are dropped.
pub const MAX_TOKEN_LEN: usize = 40;
pub const EDGE_NGRAM_MIN: usize = 1;
pub const EDGE_NGRAM_MAX: usize = 20;

/// Marker of classification and category tokens in `collector.all`.
pub const CATEGORY_MARKER: char = '#';

static TEXT: Lazy<TextAnalyzer> = Lazy::new(|| {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
        .filter(LowerCaser)
        .filter(AsciiFoldingFilter)
        .build()
});

static KEYWORD: Lazy<TextAnalyzer> = Lazy::new(|| {
    TextAnalyzer::builder(RawTokenizer::default())
        .filter(LowerCaser)
        .filter(AsciiFoldingFilter)
        .build()
});

fn run(analyzer: &TextAnalyzer, text: &str) -> Vec<String> {
    let mut analyzer = analyzer.clone();
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    stream.process(&mut |token| tokens.push(token.text.clone()));
    tokens
}

/// Normalized word tokens of a free-text value.
pub fn text_tokens(text: &str) -> Vec<String> {
    run(&TEXT, text)
}

/// The whole value as one normalized token.
pub fn keyword(text: &str) -> String {
    run(&KEYWORD, text.trim()).into_iter().next().unwrap_or_default()
}

/// Leading substrings of `token` as written to prefix fields.
pub fn edge_ngrams(token: &str) -> impl Iterator<Item = &str> {
    token
        .char_indices()
        .map(|(idx, c)| idx + c.len_utf8())
        .skip(EDGE_NGRAM_MIN - 1)
        .take(EDGE_NGRAM_MAX - EDGE_NGRAM_MIN + 1)
        .map(move |end| &token[..end])
}

/// Split a query into category tokens (`#osm.amenity`) and the remaining
/// text.
pub fn split_categories(query: &str) -> (Vec<&str>, String) {
    let (categories, words): (Vec<&str>, Vec<&str>) = query
        .split_whitespace()
        .partition(|word| word.starts_with(CATEGORY_MARKER));
    (categories, words.join(" "))
}

/// Whether a category query token selects `tag`: equal, or a dot-separated
/// prefix of it with at least two segments.
pub fn category_matches(query: &str, tag: &str) -> bool {
    let query = query.trim_start_matches(CATEGORY_MARKER);
    let tag = tag.trim_start_matches(CATEGORY_MARKER);
    query.contains('.')
        && (tag == query || tag.strip_prefix(query).is_some_and(|rest| rest.starts_with('.')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_tokens_are_folded() {
        assert_eq!(text_tokens("Hauptstraße 12a"), vec!["hauptstrasse", "12a"]);
        assert_eq!(text_tokens("Café-Kranzler, Berlin"), vec!["cafe", "kranzler", "berlin"]);
        assert!(text_tokens(" ,; ").is_empty());
    }

    #[test]
    fn test_keyword_keeps_whole_value() {
        assert_eq!(keyword(" Rue de l'Église "), "rue de l'eglise");
        assert_eq!(keyword(""), "");
    }

    #[test]
    fn test_edge_ngrams() {
        assert_eq!(edge_ngrams("ber").collect::<Vec<_>>(), vec!["b", "be", "ber"]);
        assert_eq!(edge_ngrams("äb").collect::<Vec<_>>(), vec!["ä", "äb"]);
        assert_eq!(edge_ngrams(&"x".repeat(30)).count(), EDGE_NGRAM_MAX);
    }

    #[test]
    fn test_categories() {
        let (cats, rest) = split_categories("#osm.amenity cafe #osm.shop.deli");
        assert_eq!(cats, vec!["#osm.amenity", "#osm.shop.deli"]);
        assert_eq!(rest, "cafe");

        assert!(category_matches("#osm.amenity", "#osm.amenity.cafe"));
        assert!(category_matches("#osm.amenity.cafe", "osm.amenity.cafe"));
        assert!(!category_matches("#osm.amen", "#osm.amenity.cafe"));
        assert!(!category_matches("#osm", "#osm.amenity.cafe"));
    }
}
