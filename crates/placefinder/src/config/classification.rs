//! Search synonyms and classification terms.
//!
//! The JSON file has the shape
//! `{"search_synonyms": [...], "classification_terms": [{"key", "value", "terms": [...]}]}`.
//! Each classification term makes a plain query word also match the
//! `#osm.<key>.<value>` tag of a place.

use std::collections::BTreeSet;
use std::path::Path;

use ahash::AHashMap as HashMap;
use itertools::Itertools;
use serde::Deserialize;
use tracing::{info, warn};

use crate::document::classification_string;
use crate::error::{PlaceFinderError, Result};

#[derive(Debug, Clone, Deserialize)]
struct ClassificationTerm {
    key: String,
    value: String,
    #[serde(default)]
    terms: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SynonymFile {
    #[serde(default)]
    search_synonyms: Vec<String>,
    #[serde(default)]
    classification_terms: Vec<ClassificationTerm>,
}

/// Validated synonym configuration.
#[derive(Debug, Clone, Default)]
pub struct ClassificationConfig {
    search_synonyms: Vec<String>,
    expansions: HashMap<String, BTreeSet<String>>,
}

impl ClassificationConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        info!(
            path = %path.display(),
            synonyms = config.search_synonyms.len(),
            classification_terms = config.expansions.len(),
            "Loaded synonym configuration"
        );
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: SynonymFile = serde_json::from_str(content).map_err(|e| {
            PlaceFinderError::ConfigError(format!("Malformed synonym file: {e}"))
        })?;

        let mut expansions: HashMap<String, BTreeSet<String>> = HashMap::new();
        for term in &file.classification_terms {
            let Some(class) = classification_string(&term.key, &term.value) else {
                warn!(key = %term.key, value = %term.value, "Skipping invalid classification term");
                continue;
            };

            for word in term.terms.iter().flatten() {
                let norm = word.trim().to_lowercase();
                if norm.contains(char::is_whitespace) {
                    return Err(PlaceFinderError::ConfigError(format!(
                        "Syntax error in synonym file: only single word classification terms allowed, got '{word}'"
                    )));
                }
                if norm.chars().count() > 1 {
                    expansions.entry(norm).or_default().insert(class.clone());
                }
            }
        }

        Ok(Self {
            search_synonyms: file.search_synonyms,
            expansions,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.search_synonyms.is_empty() && self.expansions.is_empty()
    }

    /// Classification tags a lowercase query word expands to.
    pub fn expansions_for(&self, term: &str) -> Option<&BTreeSet<String>> {
        self.expansions.get(term)
    }

    pub fn search_synonyms(&self) -> &[String] {
        &self.search_synonyms
    }

    /// Synonym rules of the form `term => #osm.k.v,#osm.k2.v2`, sorted by term.
    pub fn synonym_rules(&self) -> Vec<String> {
        self.expansions
            .iter()
            .sorted_by(|a, b| a.0.cmp(b.0))
            .map(|(term, classes)| format!("{term} => {}", classes.iter().join(",")))
            .collect()
    }
}
