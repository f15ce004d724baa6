//! Priority-weighted search term collection.
//!
//! Collector strings have the form `term|prio;term|prio;...`, highest
//! priority first. Both index adapters parse them back with
//! [`parse_collector_string`].

use ahash::AHashMap as HashMap;
use itertools::Itertools;

const PRIORITY_SEPARATOR: char = '|';
const TERM_SEPARATOR: char = ';';

/// Deduplicating collection of `(term, priority)` pairs.
///
/// A term keeps the highest priority it was ever added with. Iteration and
/// serialization order is by priority, then by first insertion.
#[derive(Debug, Clone, Default)]
pub struct TermCollector {
    terms: Vec<(String, u32)>,
    positions: HashMap<String, usize>,
}

impl TermCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, term: &str, priority: u32) {
        let cleaned = term.replace([PRIORITY_SEPARATOR, TERM_SEPARATOR], " ");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return;
        }
        let priority = priority.max(1);

        match self.positions.get(cleaned) {
            Some(&idx) => {
                let current = &mut self.terms[idx].1;
                *current = (*current).max(priority);
            }
            None => {
                self.positions.insert(cleaned.to_string(), self.terms.len());
                self.terms.push((cleaned.to_string(), priority));
            }
        }
    }

    pub fn add_all<'a>(&mut self, terms: impl IntoIterator<Item = &'a str>, priority: u32) {
        for term in terms {
            self.add(term, priority);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn priority(&self, term: &str) -> Option<u32> {
        self.positions.get(term).map(|&idx| self.terms[idx].1)
    }

    pub fn to_collector_string(&self) -> String {
        self.terms
            .iter()
            .sorted_by(|a, b| b.1.cmp(&a.1))
            .map(|(term, prio)| format!("{term}{PRIORITY_SEPARATOR}{prio}"))
            .join(&TERM_SEPARATOR.to_string())
    }
}

impl<'a> FromIterator<&'a str> for TermCollector {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        let mut collector = Self::new();
        collector.add_all(iter, 1);
        collector
    }
}

/// Split a collector string into `(term, priority)` pairs. Entries without
/// a parseable priority get priority 1.
pub fn parse_collector_string(value: &str) -> Vec<(&str, u32)> {
    value
        .split(TERM_SEPARATOR)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.rsplit_once(PRIORITY_SEPARATOR) {
            Some((term, prio)) => (term, prio.parse().unwrap_or(1)),
            None => (entry, 1),
        })
        .collect()
}
