use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PlaceFinderError, Result};

mod classification;

pub use classification::ClassificationConfig;

pub const DEFAULT_LANGUAGES: [&str; 4] = ["en", "de", "fr", "it"];

/// Sentinel in the extra-tag list that keeps every tag.
pub const ALL_EXTRA_TAGS: &str = "ALL";

/// Empirically tuned relevance knobs.
///
/// Defaults are the values the ranking has been calibrated with; change them
/// only together with a relevance review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceParams {
    /// Interpolations spanning this many numbers or more are not expanded.
    pub interpolation_max_span: i64,
    /// Interpolation steps must stay below this value.
    pub interpolation_max_step: i64,
    /// House-number tokens must be shorter than this many characters.
    pub house_number_max_len: usize,
    pub lenient_minimum_should_match: String,
    pub house_number_boost: f32,
    pub exact_house_number_weight: f32,
    pub weak_boost: f32,
    pub importance_factor_alphabetic: f32,
    pub importance_factor_other: f32,
    pub short_query_demotion: f32,
    pub location_bias_max_weight: f32,
}

impl Default for RelevanceParams {
    fn default() -> Self {
        Self {
            interpolation_max_span: 600,
            interpolation_max_step: 10,
            house_number_max_len: 20,
            lenient_minimum_should_match: "-34%".to_string(),
            house_number_boost: 0.3,
            exact_house_number_weight: 10.0,
            weak_boost: 0.1,
            importance_factor_alphabetic: 40.0,
            importance_factor_other: 20.0,
            short_query_demotion: 0.4,
            location_bias_max_weight: 38.0,
        }
    }
}

/// Which extra tags are copied into the index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum ExtraTagsConfig {
    #[default]
    None,
    All,
    Only(Vec<String>),
}

impl From<Vec<String>> for ExtraTagsConfig {
    fn from(tags: Vec<String>) -> Self {
        match tags.as_slice() {
            [] => Self::None,
            [single] if single == ALL_EXTRA_TAGS => Self::All,
            _ => Self::Only(tags),
        }
    }
}

impl From<ExtraTagsConfig> for Vec<String> {
    fn from(config: ExtraTagsConfig) -> Self {
        match config {
            ExtraTagsConfig::None => Vec::new(),
            ExtraTagsConfig::All => vec![ALL_EXTRA_TAGS.to_string()],
            ExtraTagsConfig::Only(tags) => tags,
        }
    }
}

impl ExtraTagsConfig {
    pub fn filter(&self, tags: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        match self {
            Self::None => BTreeMap::new(),
            Self::All => tags.clone(),
            Self::Only(allowed) => allowed
                .iter()
                .filter_map(|key| tags.get(key).map(|v| (key.clone(), v.clone())))
                .collect(),
        }
    }
}

/// Engine-wide, immutable configuration shared by planners, searcher and
/// importer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub languages: Vec<String>,
    pub default_language: String,
    pub default_limit: usize,
    pub max_results: usize,
    pub reverse_default_limit: usize,
    pub reverse_max_radius_km: f64,
    pub query_timeout: Duration,
    pub bulk_batch_size: usize,
    pub import_threads: usize,
    pub extra_tags: ExtraTagsConfig,
    pub relevance: RelevanceParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.iter().map(ToString::to_string).collect(),
            default_language: "default".to_string(),
            default_limit: 15,
            max_results: 50,
            reverse_default_limit: 1,
            reverse_max_radius_km: 5000.0,
            query_timeout: Duration::from_secs(7),
            bulk_batch_size: 10_000,
            import_threads: 4,
            extra_tags: ExtraTagsConfig::None,
            relevance: RelevanceParams::default(),
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| PlaceFinderError::ConfigError(format!("Malformed config file: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// `"default"` selects the untranslated name and is always accepted.
    pub fn supports_language(&self, language: &str) -> bool {
        language == "default" || self.languages.iter().any(|l| l == language)
    }

    fn validate(&self) -> Result<()> {
        if self.languages.is_empty() {
            return Err(PlaceFinderError::ConfigError(
                "At least one language must be configured".to_string(),
            ));
        }
        if !self.supports_language(&self.default_language) {
            return Err(PlaceFinderError::ConfigError(format!(
                "Default language '{}' is not in the language list {:?}",
                self.default_language, self.languages
            )));
        }
        if self.max_results == 0 || self.default_limit == 0 || self.default_limit > self.max_results
        {
            return Err(PlaceFinderError::ConfigError(format!(
                "Default limit {} must be between 1 and max results {}",
                self.default_limit, self.max_results
            )));
        }
        if self.bulk_batch_size == 0 || self.import_threads == 0 {
            return Err(PlaceFinderError::ConfigError(
                "Batch size and import threads must be positive".to_string(),
            ));
        }
        if self.reverse_max_radius_km <= 0.0 {
            return Err(PlaceFinderError::ConfigError(
                "Reverse radius cap must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for engine configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// A single-language setup where results are localised to English
    /// instead of the untranslated name.
    pub fn strict_languages() -> Self {
        let mut builder = Self::new();
        builder.config.languages = vec!["en".to_string()];
        builder.config.default_language = "en".to_string();
        builder
    }

    /// Keep every extra tag of a place in the index.
    pub fn with_all_extra_tags() -> Self {
        let mut builder = Self::new();
        builder.config.extra_tags = ExtraTagsConfig::All;
        builder
    }

    pub fn languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn default_language(mut self, language: &str) -> Self {
        language.clone_into(&mut self.config.default_language);
        self
    }

    pub const fn max_results(mut self, max: usize) -> Self {
        self.config.max_results = max;
        self
    }

    pub const fn default_limit(mut self, limit: usize) -> Self {
        self.config.default_limit = limit;
        self
    }

    pub const fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = timeout;
        self
    }

    pub fn extra_tags(mut self, tags: Vec<String>) -> Self {
        self.config.extra_tags = ExtraTagsConfig::from(tags);
        self
    }

    pub fn relevance(mut self, relevance: RelevanceParams) -> Self {
        self.config.relevance = relevance;
        self
    }

    pub const fn import_threads(mut self, threads: usize) -> Self {
        self.config.import_threads = threads;
        self
    }

    pub const fn bulk_batch_size(mut self, size: usize) -> Self {
        self.config.bulk_batch_size = size;
        self
    }

    /// Validate and build the final configuration
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfigBuilder::new().build().unwrap();
        assert_eq!(config.languages, vec!["en", "de", "fr", "it"]);
        assert_eq!(config.default_limit, 15);
        assert_eq!(config.max_results, 50);
        assert_eq!(config.bulk_batch_size, 10_000);
        assert_eq!(config.query_timeout, Duration::from_secs(7));
        assert_eq!(config.relevance.lenient_minimum_should_match, "-34%");
        assert!(config.supports_language("default"));
        assert!(!config.supports_language("nl"));
    }

    #[test]
    fn test_presets_and_setters() {
        let config = EngineConfigBuilder::strict_languages()
            .max_results(20)
            .default_limit(5)
            .build()
            .unwrap();
        assert_eq!(config.languages, vec!["en"]);
        assert_eq!(config.default_language, "en");
        assert_eq!(config.default_limit, 5);

        let config = EngineConfigBuilder::with_all_extra_tags().build().unwrap();
        assert_eq!(config.extra_tags, ExtraTagsConfig::All);
    }

    #[test]
    fn test_invalid_configurations() {
        assert!(matches!(
            EngineConfigBuilder::new().languages(Vec::<String>::new()).build(),
            Err(PlaceFinderError::ConfigError(_))
        ));
        assert!(
            EngineConfigBuilder::new()
                .default_limit(60)
                .build()
                .is_err()
        );
        assert!(
            EngineConfigBuilder::new()
                .default_language("nl")
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_extra_tags_filter() {
        let tags: BTreeMap<String, String> = [("cuisine", "german"), ("wheelchair", "yes")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        assert!(ExtraTagsConfig::None.filter(&tags).is_empty());
        assert_eq!(ExtraTagsConfig::All.filter(&tags), tags);

        let only = ExtraTagsConfig::from(vec!["wheelchair".to_string(), "opening_hours".to_string()]);
        let filtered = only.filter(&tags);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get("wheelchair").map(String::as_str), Some("yes"));

        assert_eq!(
            ExtraTagsConfig::from(vec!["ALL".to_string()]),
            ExtraTagsConfig::All
        );
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"languages": ["en", "nl"], "extra_tags": ["ALL"], "relevance": {{"weak_boost": 0.2}}}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.languages, vec!["en", "nl"]);
        assert_eq!(config.extra_tags, ExtraTagsConfig::All);
        assert!((config.relevance.weak_boost - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.relevance.interpolation_max_span, 600);
        assert_eq!(config.default_limit, 15);
    }
}
