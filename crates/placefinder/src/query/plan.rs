//! Backend-agnostic retrieval plans.
//!
//! A plan is a tree of [`Clause`] values with function-score nodes on top.
//! Planners only ever produce plans; index adapters interpret them. Bool
//! clauses are assembled with [`BoolClause`], whose methods consume the value
//! and return the extended one, so a finished clause cannot be altered
//! through another handle.

use std::fmt;

use placefinder_data_processing::{Envelope, Point};
use serde::{Deserialize, Serialize};

/// Field names understood by every adapter.
pub mod fields {
    pub const COLLECTOR_ALL: &str = "collector.all";
    pub const COLLECTOR_ALL_NGRAM: &str = "collector.all.ngram";
    pub const COLLECTOR_NAME: &str = "collector.name";
    pub const COLLECTOR_NAME_PREFIX: &str = "collector.name.prefix";
    pub const COLLECTOR_PARENT: &str = "collector.parent";
    pub const HOUSENUMBER: &str = "housenumber";
    pub const HOUSENUMBER_FULL: &str = "housenumber.full";
    pub const OBJECT_TYPE: &str = "type";
    pub const COUNTRYCODE: &str = "countrycode";
    pub const POSTCODE: &str = "postcode";
    pub const COORDINATE: &str = "coordinate";
    pub const IMPORTANCE: &str = "importance";
    pub const OSM_KEY: &str = "osm_key";
    pub const OSM_VALUE: &str = "osm_value";
    pub const STREET: &str = "street";
    pub const NAME: &str = "name";
    pub const EXTRA_PREFIX: &str = "extra.";

    /// `collector.field.<part>`: exact values of one address part.
    pub fn collector_field(part: &str) -> String {
        format!("collector.field.{part}")
    }

    /// `collector.field.<part>.full`: the whole value as one token.
    pub fn collector_field_full(part: &str) -> String {
        format!("collector.field.{part}.full")
    }
}

/// Allowed edit distance for fuzzy matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Fuzziness {
    #[default]
    Exact,
    Edits(u8),
    /// 0 edits for terms up to 2 characters, 1 up to 5, 2 beyond.
    Auto,
}

impl Fuzziness {
    pub const fn lenient(lenient: bool) -> Self {
        if lenient { Self::Auto } else { Self::Exact }
    }

    pub fn max_edits(self, term: &str) -> usize {
        match self {
            Self::Exact => 0,
            Self::Edits(n) => usize::from(n),
            Self::Auto => match term.chars().count() {
                0..=2 => 0,
                3..=5 => 1,
                _ => 2,
            },
        }
    }
}

impl fmt::Display for Fuzziness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("0"),
            Self::Edits(n) => write!(f, "{n}"),
            Self::Auto => f.write_str("AUTO"),
        }
    }
}

/// How many optional terms of a match must be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinimumShouldMatch {
    Count(i32),
    /// Percentage of the term count; negative values give the number of
    /// terms allowed to be missing.
    Percent(i32),
    /// `n<spec` pairs: above `n` terms, `spec` applies.
    Conditional(Vec<(usize, MinimumShouldMatch)>),
}

impl MinimumShouldMatch {
    /// Parse the usual textual forms: `2`, `-1`, `75%`, `-34%`, `2<-1 6<-2`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.contains('<') {
            let parts = text
                .split_whitespace()
                .map(|part| {
                    let (n, spec) = part.split_once('<')?;
                    Some((n.parse().ok()?, Self::parse(spec)?))
                })
                .collect::<Option<Vec<_>>>()?;
            return (!parts.is_empty()).then_some(Self::Conditional(parts));
        }
        if let Some(percent) = text.strip_suffix('%') {
            return percent.parse().ok().map(Self::Percent);
        }
        text.parse().ok().map(Self::Count)
    }

    /// Required number of matching terms out of `total`.
    pub fn required(&self, total: usize) -> usize {
        let total_i = total as i64;
        let required = match self {
            Self::Count(n) => {
                let n = i64::from(*n);
                if n < 0 { total_i + n } else { n }
            }
            Self::Percent(p) => {
                let p = i64::from(*p);
                let part = total_i * p.abs() / 100;
                if p < 0 { total_i - part } else { part }
            }
            Self::Conditional(steps) => {
                return steps
                    .iter()
                    .rev()
                    .find(|(n, _)| total > *n)
                    .map_or(total, |(_, spec)| spec.required(total));
            }
        };
        required.clamp(0, total_i) as usize
    }
}

impl fmt::Display for MinimumShouldMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Percent(p) => write!(f, "{p}%"),
            Self::Conditional(steps) => {
                let parts: Vec<String> = steps.iter().map(|(n, s)| format!("{n}<{s}")).collect();
                f.write_str(&parts.join(" "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Operator {
    #[default]
    Or,
    And,
}

/// Analyzed full-text match against one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchClause {
    pub field: String,
    pub query: String,
    pub fuzziness: Fuzziness,
    pub prefix_length: u32,
    pub operator: Operator,
    pub minimum_should_match: Option<MinimumShouldMatch>,
    pub boost: f32,
}

impl MatchClause {
    pub fn new(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            query: query.into(),
            fuzziness: Fuzziness::Exact,
            prefix_length: 0,
            operator: Operator::Or,
            minimum_should_match: None,
            boost: 1.0,
        }
    }

    pub const fn fuzziness(mut self, fuzziness: Fuzziness) -> Self {
        self.fuzziness = fuzziness;
        self
    }

    pub const fn prefix_length(mut self, prefix_length: u32) -> Self {
        self.prefix_length = prefix_length;
        self
    }

    pub const fn operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    pub fn minimum_should_match(mut self, msm: MinimumShouldMatch) -> Self {
        self.minimum_should_match = Some(msm);
        self
    }

    pub const fn boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn build(self) -> Clause {
        Clause::Match(self)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoolClause {
    pub must: Vec<Clause>,
    pub should: Vec<Clause>,
    pub filter: Vec<Clause>,
    pub must_not: Vec<Clause>,
    pub minimum_should_match: Option<u32>,
    pub boost: Option<f32>,
}

impl BoolClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn must(mut self, clause: Clause) -> Self {
        self.must.push(clause);
        self
    }

    pub fn should(mut self, clause: Clause) -> Self {
        self.should.push(clause);
        self
    }

    pub fn filter(mut self, clause: Clause) -> Self {
        self.filter.push(clause);
        self
    }

    pub fn must_not(mut self, clause: Clause) -> Self {
        self.must_not.push(clause);
        self
    }

    pub fn minimum_should_match(mut self, count: u32) -> Self {
        self.minimum_should_match = Some(count);
        self
    }

    pub fn boost(mut self, boost: f32) -> Self {
        self.boost = Some(boost);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
            && self.should.is_empty()
            && self.filter.is_empty()
            && self.must_not.is_empty()
    }

    /// Should clauses required to match: the explicit value, else one when
    /// there are should clauses but no must or filter clauses.
    pub fn effective_minimum_should_match(&self) -> usize {
        self.minimum_should_match.map_or_else(
            || usize::from(!self.should.is_empty() && self.must.is_empty() && self.filter.is_empty()),
            |n| n as usize,
        )
    }

    pub fn build(self) -> Clause {
        Clause::Bool(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScoreMode {
    #[default]
    Multiply,
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoostMode {
    #[default]
    Multiply,
    Sum,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScoreFunction {
    /// Constant weight, applied only to documents matching `filter`.
    Weight {
        weight: f32,
        filter: Option<Box<Clause>>,
    },
    /// `factor * field`, or `factor * missing` when the field is absent.
    FieldValueFactor {
        field: String,
        factor: f32,
        missing: f64,
    },
    /// `weight * decay^(max(0, distance - offset) / scale)`.
    ExpDecay {
        field: String,
        origin: Point,
        scale_km: f64,
        offset_km: f64,
        decay: f64,
        weight: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionScoreClause {
    pub query: Box<Clause>,
    pub functions: Vec<ScoreFunction>,
    pub score_mode: ScoreMode,
    pub boost_mode: BoostMode,
    pub boost: f32,
}

impl FunctionScoreClause {
    pub fn new(query: Clause) -> Self {
        Self {
            query: Box::new(query),
            functions: Vec::new(),
            score_mode: ScoreMode::default(),
            boost_mode: BoostMode::default(),
            boost: 1.0,
        }
    }

    pub fn function(mut self, function: ScoreFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub const fn score_mode(mut self, mode: ScoreMode) -> Self {
        self.score_mode = mode;
        self
    }

    pub const fn boost_mode(mut self, mode: BoostMode) -> Self {
        self.boost_mode = mode;
        self
    }

    pub const fn boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn build(self) -> Clause {
        Clause::FunctionScore(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
    MatchAll,
    Match(MatchClause),
    MatchPhrase {
        field: String,
        query: String,
        boost: f32,
    },
    /// Exact keyword value.
    Term {
        field: String,
        value: String,
    },
    /// Any of the keyword values.
    Terms {
        field: String,
        values: Vec<String>,
        boost: f32,
    },
    /// Whole keyword value within an edit distance.
    Fuzzy {
        field: String,
        value: String,
        fuzziness: Fuzziness,
        boost: f32,
    },
    /// `*` and `?` wildcards over a keyword value.
    Wildcard {
        field: String,
        pattern: String,
    },
    Exists {
        field: String,
    },
    /// Free-form query string over all text of a record.
    QueryString {
        query: String,
    },
    GeoDistance {
        field: String,
        center: Point,
        radius_km: f64,
    },
    GeoBoundingBox {
        field: String,
        bbox: Envelope,
    },
    Bool(BoolClause),
    DisMax {
        queries: Vec<Clause>,
        boost: f32,
    },
    FunctionScore(FunctionScoreClause),
}

impl Clause {
    pub fn term(field: &str, value: impl Into<String>) -> Self {
        Self::Term {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn terms<I, S>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Terms {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
            boost: 1.0,
        }
    }

    pub fn exists(field: &str) -> Self {
        Self::Exists {
            field: field.to_string(),
        }
    }

    pub fn match_phrase(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self::MatchPhrase {
            field: field.into(),
            query: query.into(),
            boost: 1.0,
        }
    }

    /// `NOT clause` as a bool clause.
    pub fn not(clause: Self) -> Self {
        BoolClause::new().must_not(clause).build()
    }
}

/// Ascending geo-distance ordering from a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoSort {
    pub field: &'static str,
    pub center: Point,
}

/// What a planner hands to the index gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalPlan {
    pub query: Clause,
    pub sort: Option<GeoSort>,
}

impl RetrievalPlan {
    pub const fn new(query: Clause) -> Self {
        Self { query, sort: None }
    }

    pub const fn sorted_by_distance(mut self, center: Point) -> Self {
        self.sort = Some(GeoSort {
            field: fields::COORDINATE,
            center,
        });
        self
    }
}
