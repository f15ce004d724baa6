//! Engine configuration and customization
//!
//! This example demonstrates how to configure the engine: presets,
//! individual settings, JSON config files and classification terms.

use std::io::Write;

use placefinder::{ClassificationConfig, EngineConfig, EngineConfigBuilder, RelevanceParams};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Preset configurations
    let default = EngineConfigBuilder::new().build()?;
    println!("Default:        languages {:?}, limit {}", default.languages, default.default_limit);

    let english = EngineConfigBuilder::strict_languages().build()?;
    println!("English only:   default language '{}'", english.default_language);

    let all_tags = EngineConfigBuilder::with_all_extra_tags().build()?;
    println!("All extra tags: {:?}", all_tags.extra_tags);

    // Custom configuration
    let custom = EngineConfig::builder()
        .languages(["de", "en"])
        .default_language("de")
        .max_results(20)
        .default_limit(5)
        .extra_tags(vec!["wheelchair".to_string(), "opening_hours".to_string()])
        .relevance(RelevanceParams {
            location_bias_max_weight: 20.0,
            ..RelevanceParams::default()
        })
        .import_threads(8)
        .build()?;
    println!("\nCustom:         {custom:#?}");

    // Configuration files hold the same fields
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, r#"{{"languages": ["fr"], "default_language": "fr", "default_limit": 3}}"#)?;
    let from_file = EngineConfig::from_json_file(file.path())?;
    println!("\nFrom file:      languages {:?}, limit {}", from_file.languages, from_file.default_limit);

    // Classification terms let "restaurant" find places tagged amenity=restaurant
    let classification = ClassificationConfig::from_json_str(
        r#"{"search_synonyms": [], "classification_terms": [
            {"key": "amenity", "value": "restaurant", "terms": ["Restaurant", "Gaststätte"]}
        ]}"#,
    )?;
    println!("\nSynonym rules:");
    for rule in classification.synonym_rules() {
        println!("  {rule}");
    }

    Ok(())
}
