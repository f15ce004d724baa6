//! OSM key/value filters (`osm_tag=...`).

use std::fmt;
use std::str::FromStr;

use super::error::{QueryError, Result};
use super::plan::{BoolClause, Clause, fields};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagFilterKind {
    Include,
    Exclude,
    /// The key must be present but with a value other than the given one.
    ExcludeValue,
}

/// One parsed filter expression. At least one of key and value is set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagFilter {
    kind: TagFilterKind,
    key: Option<String>,
    value: Option<String>,
}

impl TagFilter {
    pub fn new(kind: TagFilterKind, key: Option<&str>, value: Option<&str>) -> Result<Self> {
        let key = key.filter(|k| !k.is_empty()).map(str::to_string);
        let value = value.filter(|v| !v.is_empty()).map(str::to_string);
        if key.is_none() && value.is_none() {
            return Err(QueryError::bad_request("Tag filter needs a key or a value."));
        }
        if kind == TagFilterKind::ExcludeValue && (key.is_none() || value.is_none()) {
            return Err(QueryError::bad_request(
                "Excluding a value requires both key and value.",
            ));
        }
        Ok(Self { kind, key, value })
    }

    /// Parse `key`, `!key`, `key:value`, `!key:value`, `key:!value`,
    /// `:value` or `:!value`.
    pub fn parse(filter: &str) -> Result<Self> {
        let invalid = || QueryError::bad_request(format!("Invalid filter expression osm_tag={filter}."));
        let parts: Vec<&str> = filter.split(':').collect();

        match parts.as_slice() {
            [key] => {
                let (exclude, key) = strip_negation(key);
                if key.is_empty() {
                    return Err(invalid());
                }
                let kind = if exclude { TagFilterKind::Exclude } else { TagFilterKind::Include };
                Self::new(kind, Some(key), None)
            }
            [key, value] => {
                let (exclude_key, key) = strip_negation(key);
                let (exclude_value, value) = strip_negation(value);
                if value.is_empty() {
                    return Err(invalid());
                }
                let kind = if !key.is_empty() && !exclude_key && exclude_value {
                    TagFilterKind::ExcludeValue
                } else if exclude_key || exclude_value {
                    TagFilterKind::Exclude
                } else {
                    TagFilterKind::Include
                };
                Self::new(kind, Some(key), Some(value))
            }
            _ => Err(invalid()),
        }
    }

    pub const fn kind(&self) -> TagFilterKind {
        self.kind
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub const fn is_key_only(&self) -> bool {
        self.value.is_none()
    }

    pub const fn is_value_only(&self) -> bool {
        self.key.is_none()
    }

    /// The clause matching documents that carry this key/value pair,
    /// ignoring the filter kind.
    fn positive_clause(&self) -> Clause {
        match (self.key(), self.value()) {
            (Some(key), None) => Clause::terms(fields::OSM_KEY, [key]),
            (None, Some(value)) => Clause::terms(fields::OSM_VALUE, [value]),
            (Some(key), Some(value)) if key.starts_with(fields::EXTRA_PREFIX) => {
                extra_value_clause(key, value)
            }
            (Some(key), Some(value)) => BoolClause::new()
                .must(Clause::terms(fields::OSM_KEY, [key]))
                .must(Clause::terms(fields::OSM_VALUE, [value]))
                .build(),
            (None, None) => Clause::MatchAll,
        }
    }

    fn exclude_value_clause(&self) -> Clause {
        let key = self.key().unwrap_or_default();
        let value = self.value().unwrap_or_default();
        if key.starts_with(fields::EXTRA_PREFIX) {
            BoolClause::new()
                .must(Clause::exists(key))
                .must_not(extra_value_clause(key, value))
                .build()
        } else {
            BoolClause::new()
                .must(Clause::terms(fields::OSM_KEY, [key]))
                .must_not(Clause::terms(fields::OSM_VALUE, [value]))
                .build()
        }
    }
}

impl FromStr for TagFilter {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.key().unwrap_or_default();
        let value = self.value();
        match (self.kind, value) {
            (TagFilterKind::Include, None) => write!(f, "{key}"),
            (TagFilterKind::Include, Some(v)) => write!(f, "{key}:{v}"),
            (TagFilterKind::Exclude, None) => write!(f, "!{key}"),
            (TagFilterKind::Exclude, Some(v)) if key.is_empty() => write!(f, ":!{v}"),
            (TagFilterKind::Exclude, Some(v)) => write!(f, "!{key}:{v}"),
            (TagFilterKind::ExcludeValue, v) => write!(f, "{key}:!{}", v.unwrap_or_default()),
        }
    }
}

fn strip_negation(part: &str) -> (bool, &str) {
    part.strip_prefix('!').map_or((false, part), |rest| (true, rest))
}

fn extra_value_clause(field: &str, value: &str) -> Clause {
    if value.contains(['*', '?']) {
        Clause::Wildcard {
            field: field.to_string(),
            pattern: value.to_string(),
        }
    } else {
        Clause::terms(field, [value])
    }
}

/// Combine filters into one predicate: any include matches, and no exclude
/// matches. `None` when there is nothing to filter on.
pub fn build_tag_filter(filters: &[TagFilter]) -> Option<Clause> {
    let mut include = BoolClause::new();
    let mut exclude = BoolClause::new();

    for filter in filters {
        match filter.kind {
            TagFilterKind::ExcludeValue => include = include.should(filter.exclude_value_clause()),
            TagFilterKind::Include => include = include.should(filter.positive_clause()),
            TagFilterKind::Exclude => exclude = exclude.should(filter.positive_clause()),
        }
    }

    if include.is_empty() && exclude.is_empty() {
        return None;
    }

    let mut predicate = BoolClause::new();
    if !include.is_empty() {
        predicate = predicate.must(include.build());
    }
    if !exclude.is_empty() {
        predicate = predicate.must_not(exclude.build());
    }
    Some(predicate.build())
}
