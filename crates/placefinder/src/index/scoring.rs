//! Evaluation of retrieval plans against analyzed records.
//!
//! Scores follow the usual search-engine conventions closely enough for
//! ranking to behave the same way: matched terms contribute their collector
//! priority, fuzzy matches are discounted by their edit distance, filter
//! clauses never add to the score and function scores combine with the
//! query score according to their boost mode.

use ahash::AHashMap as HashMap;
use rapidfuzz::distance::levenshtein;
use regex::Regex;

use super::analysis::{self, CATEGORY_MARKER, EDGE_NGRAM_MAX};
use crate::config::ClassificationConfig;
use crate::document::IndexRecord;
use crate::document::terms::parse_collector_string;
use crate::query::plan::{
    BoolClause, BoostMode, Clause, FunctionScoreClause, MatchClause, Operator, ScoreFunction,
    ScoreMode, fields,
};

#[derive(Debug, Clone)]
struct FieldValue {
    tokens: Vec<String>,
    keyword: String,
    weight: f32,
}

impl FieldValue {
    fn new(text: &str, weight: u32) -> Self {
        Self {
            tokens: analysis::text_tokens(text),
            keyword: analysis::keyword(text),
            weight: weight as f32,
        }
    }
}

/// A stored record together with its analyzed field values.
#[derive(Debug, Clone)]
pub(super) struct AnalyzedRecord {
    pub record: IndexRecord,
    fields: HashMap<String, Vec<FieldValue>>,
    /// `#`-prefixed classification and category tags.
    tags: Vec<String>,
}

impl AnalyzedRecord {
    pub fn new(record: IndexRecord) -> Self {
        let mut analyzed: HashMap<String, Vec<FieldValue>> = HashMap::new();
        let mut tags = Vec::new();
        let mut add = |field: &str, text: &str, weight: u32| {
            analyzed
                .entry(field.to_string())
                .or_default()
                .push(FieldValue::new(text, weight));
        };

        for (term, priority) in parse_collector_string(&record.collector.all) {
            if term.starts_with(CATEGORY_MARKER) {
                tags.push(term.to_string());
            } else {
                add(fields::COLLECTOR_ALL, term, priority);
            }
        }
        let weighted = [
            (fields::COLLECTOR_NAME, record.collector.name.as_deref()),
            (fields::COLLECTOR_PARENT, record.collector.parent.as_deref()),
        ];
        for (field, collector) in weighted {
            for (term, priority) in collector.map(parse_collector_string).unwrap_or_default() {
                add(field, term, priority);
            }
        }
        for (part, values) in &record.collector.field {
            let field = fields::collector_field(part);
            for value in values {
                add(&field, value, 1);
            }
        }

        for name in record.name.values() {
            add(fields::NAME, name, 1);
        }
        for (part, names) in &record.address {
            for name in names.values() {
                add(part.name(), name, 1);
            }
        }
        let plain = [
            (fields::HOUSENUMBER, record.housenumber.as_deref()),
            (fields::POSTCODE, record.postcode.as_deref()),
            (fields::COUNTRYCODE, record.countrycode.as_deref()),
            (fields::OSM_KEY, Some(record.osm_key.as_str())),
            (fields::OSM_VALUE, Some(record.osm_value.as_str())),
            (fields::OBJECT_TYPE, Some(record.object_type.name())),
            ("osm_type", Some(record.osm_type.as_str())),
        ];
        for (field, value) in plain {
            if let Some(value) = value {
                add(field, value, 1);
            }
        }
        for (key, value) in &record.extra {
            add(&format!("{}{key}", fields::EXTRA_PREFIX), value, 1);
        }

        Self {
            record,
            fields: analyzed,
            tags,
        }
    }

    fn values(&self, field: &str) -> &[FieldValue] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Analysis {
    Text,
    Prefix,
    Keyword,
}

/// Base field and analysis of a field name with its sub-field suffix.
fn resolve(field: &str) -> (&str, Analysis) {
    if let Some(base) = field
        .strip_suffix(".ngram")
        .or_else(|| field.strip_suffix(".prefix"))
    {
        (base, Analysis::Prefix)
    } else if let Some(base) = field.strip_suffix(".full") {
        (base, Analysis::Keyword)
    } else {
        (field, Analysis::Text)
    }
}

/// Edit distance between a query token and an indexed token, when within
/// `max_edits` and sharing the first `prefix_length` characters. Prefix
/// analysis compares against the edge n-grams of the indexed token.
fn token_distance(query: &str, indexed: &str, max_edits: usize, prefix_length: usize, prefix: bool) -> Option<usize> {
    if prefix {
        if max_edits == 0 {
            return (indexed.starts_with(query) && query.chars().count() <= EDGE_NGRAM_MAX).then_some(0);
        }
        return analysis::edge_ngrams(indexed)
            .filter_map(|gram| token_distance(query, gram, max_edits, prefix_length, false))
            .min();
    }
    if query == indexed {
        return Some(0);
    }
    if max_edits == 0 {
        return None;
    }
    let shared = query
        .chars()
        .zip(indexed.chars())
        .take_while(|(a, b)| a == b)
        .count();
    if shared < prefix_length.min(query.chars().count()) {
        return None;
    }
    let distance = levenshtein::distance(query.chars(), indexed.chars());
    (distance <= max_edits).then_some(distance)
}

/// `*` and `?` pattern as an anchored regex.
fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let escaped = regex::escape(&analysis::keyword(pattern))
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{escaped}$")).ok()
}

/// Scores clauses against records. `None` means the record does not match.
pub(super) struct Evaluator<'a> {
    classification: &'a ClassificationConfig,
}

impl<'a> Evaluator<'a> {
    pub const fn new(classification: &'a ClassificationConfig) -> Self {
        Self { classification }
    }

    pub fn score(&self, clause: &Clause, doc: &AnalyzedRecord) -> Option<f32> {
        match clause {
            Clause::MatchAll => Some(1.0),
            Clause::Match(m) => self.match_clause(m, doc),
            Clause::MatchPhrase { field, query, boost } => match_phrase(field, query, doc).map(|w| w * boost),
            Clause::Term { field, value } => {
                let value = analysis::keyword(value);
                keyword_values(field, doc).any(|k| *k == value).then_some(1.0)
            }
            Clause::Terms { field, values, boost } => {
                let values: Vec<String> = values.iter().map(|v| analysis::keyword(v)).collect();
                keyword_values(field, doc)
                    .any(|k| values.contains(k))
                    .then_some(*boost)
            }
            Clause::Fuzzy {
                field,
                value,
                fuzziness,
                boost,
            } => {
                let value = analysis::keyword(value);
                let max_edits = fuzziness.max_edits(&value);
                keyword_values(field, doc)
                    .filter_map(|k| token_distance(&value, k, max_edits, 0, false))
                    .min()
                    .map(|d| boost / (1 + d) as f32)
            }
            Clause::Wildcard { field, pattern } => {
                let regex = wildcard_regex(pattern)?;
                keyword_values(field, doc).any(|k| regex.is_match(k)).then_some(1.0)
            }
            Clause::Exists { field } => {
                let present = match field.as_str() {
                    fields::COORDINATE => doc.record.coordinate.is_some(),
                    fields::IMPORTANCE => true,
                    _ => !doc.values(resolve(field).0).is_empty(),
                };
                present.then_some(1.0)
            }
            Clause::QueryString { query } => self.query_string(query, doc),
            Clause::GeoDistance {
                center, radius_km, ..
            } => doc
                .record
                .coordinate
                .is_some_and(|c| c.haversine_km(center) <= *radius_km)
                .then_some(1.0),
            Clause::GeoBoundingBox { bbox, .. } => doc
                .record
                .coordinate
                .is_some_and(|c| bbox.contains(&c))
                .then_some(1.0),
            Clause::Bool(b) => self.bool_clause(b, doc),
            Clause::DisMax { queries, boost } => queries
                .iter()
                .filter_map(|q| self.score(q, doc))
                .reduce(f32::max)
                .map(|best| best * boost),
            Clause::FunctionScore(fs) => self.function_score(fs, doc),
        }
    }

    fn match_clause(&self, clause: &MatchClause, doc: &AnalyzedRecord) -> Option<f32> {
        let (field, mode) = resolve(&clause.field);
        let (categories, text) = if field == fields::COLLECTOR_ALL {
            analysis::split_categories(&clause.query)
        } else {
            (Vec::new(), clause.query.clone())
        };
        let tokens = match mode {
            Analysis::Keyword => {
                let keyword = analysis::keyword(&text);
                if keyword.is_empty() { Vec::new() } else { vec![keyword] }
            }
            Analysis::Text | Analysis::Prefix => analysis::text_tokens(&text),
        };
        let total = tokens.len() + categories.len();
        if total == 0 {
            return None;
        }

        let values = doc.values(field);
        let prefix_length = clause.prefix_length as usize;
        let mut matched = 0;
        let mut sum = 0.0;
        for token in &tokens {
            let max_edits = clause.fuzziness.max_edits(token);
            let best = values
                .iter()
                .filter_map(|value| {
                    let distance = match mode {
                        Analysis::Keyword => token_distance(token, &value.keyword, max_edits, prefix_length, false),
                        Analysis::Text | Analysis::Prefix => value
                            .tokens
                            .iter()
                            .filter_map(|t| {
                                token_distance(token, t, max_edits, prefix_length, mode == Analysis::Prefix)
                            })
                            .min(),
                    }?;
                    Some(value.weight / (1 + distance) as f32)
                })
                .reduce(f32::max)
                .or_else(|| {
                    (field == fields::COLLECTOR_ALL)
                        .then(|| self.classification_match(token, doc))
                        .flatten()
                });
            if let Some(score) = best {
                matched += 1;
                sum += score;
            }
        }
        for category in &categories {
            if doc.tags.iter().any(|tag| analysis::category_matches(category, tag)) {
                matched += 1;
                sum += 1.0;
            }
        }

        let required = match clause.operator {
            Operator::And => total,
            Operator::Or => clause
                .minimum_should_match
                .as_ref()
                .map_or(1, |msm| msm.required(total))
                .max(1),
        };
        (matched >= required).then(|| clause.boost * sum / total as f32)
    }

    /// Plain query words configured as classification terms match places
    /// carrying the classification tag.
    fn classification_match(&self, token: &str, doc: &AnalyzedRecord) -> Option<f32> {
        let classes = self.classification.expansions_for(token)?;
        doc.tags.iter().any(|tag| classes.contains(tag)).then_some(1.0)
    }

    /// Whitespace separated `field:value` or plain words, all required.
    fn query_string(&self, query: &str, doc: &AnalyzedRecord) -> Option<f32> {
        let mut score = 0.0;
        for part in query.split_whitespace() {
            let (field, value) = part.split_once(':').unwrap_or((fields::COLLECTOR_ALL, part));
            let clause = MatchClause::new(field, value).operator(Operator::And);
            score += self.match_clause(&clause, doc)?;
        }
        Some(score)
    }

    fn bool_clause(&self, clause: &BoolClause, doc: &AnalyzedRecord) -> Option<f32> {
        // A bool without clauses matches everything, like `match_all`.
        if clause.is_empty() {
            return Some(clause.boost.unwrap_or(1.0));
        }
        let mut score = 0.0;
        for must in &clause.must {
            score += self.score(must, doc)?;
        }
        for filter in &clause.filter {
            self.score(filter, doc)?;
        }
        if clause.must_not.iter().any(|c| self.score(c, doc).is_some()) {
            return None;
        }
        let mut matched = 0;
        for should in &clause.should {
            if let Some(s) = self.score(should, doc) {
                matched += 1;
                score += s;
            }
        }
        if matched < clause.effective_minimum_should_match() {
            return None;
        }
        Some(score * clause.boost.unwrap_or(1.0))
    }

    fn function_score(&self, clause: &FunctionScoreClause, doc: &AnalyzedRecord) -> Option<f32> {
        let query = self.score(&clause.query, doc)?;
        let values: Vec<f32> = clause
            .functions
            .iter()
            .filter_map(|f| self.function_value(f, doc))
            .collect();
        let combined: f32 = if values.is_empty() {
            1.0
        } else {
            match clause.score_mode {
                ScoreMode::Sum => values.iter().sum(),
                ScoreMode::Multiply => values.iter().product(),
            }
        };
        let score = match clause.boost_mode {
            BoostMode::Multiply => query * combined,
            BoostMode::Sum => query + combined,
            BoostMode::Replace => combined,
        };
        Some(score * clause.boost)
    }

    fn function_value(&self, function: &ScoreFunction, doc: &AnalyzedRecord) -> Option<f32> {
        match function {
            ScoreFunction::Weight { weight, filter } => match filter {
                Some(filter) => self.score(filter, doc).map(|_| *weight),
                None => Some(*weight),
            },
            ScoreFunction::FieldValueFactor {
                field,
                factor,
                missing,
            } => {
                let value = if field == fields::IMPORTANCE {
                    doc.record.importance
                } else {
                    *missing
                };
                Some(factor * value as f32)
            }
            ScoreFunction::ExpDecay {
                origin,
                scale_km,
                offset_km,
                decay,
                weight,
                ..
            } => {
                let Some(coordinate) = doc.record.coordinate else {
                    return Some(*weight);
                };
                let distance = (coordinate.haversine_km(origin) - offset_km).max(0.0);
                let value = if *scale_km > 0.0 {
                    decay.powf(distance / scale_km)
                } else {
                    1.0
                };
                Some(weight * value as f32)
            }
        }
    }
}

fn keyword_values<'d>(field: &str, doc: &'d AnalyzedRecord) -> impl Iterator<Item = &'d String> {
    doc.values(resolve(field).0).iter().map(|v| &v.keyword)
}

/// Highest weight of a value containing the query tokens consecutively.
fn match_phrase(field: &str, query: &str, doc: &AnalyzedRecord) -> Option<f32> {
    let (field, mode) = resolve(field);
    let values = doc.values(field);
    if mode == Analysis::Keyword {
        let keyword = analysis::keyword(query);
        return values
            .iter()
            .filter(|v| v.keyword == keyword)
            .map(|v| v.weight)
            .reduce(f32::max);
    }
    let tokens = analysis::text_tokens(query);
    if tokens.is_empty() {
        return None;
    }
    values
        .iter()
        .filter(|v| v.tokens.windows(tokens.len()).any(|w| w == tokens.as_slice()))
        .map(|v| v.weight)
        .reduce(f32::max)
}
