//! Basic geocoding
//!
//! This example demonstrates the fundamental operations:
//! - Importing a place dump into an in-memory index
//! - Free-text, structured and reverse searches
//! - Working with search results

use std::sync::Arc;

use placefinder::data_processing::Point;
use placefinder::data_processing::test_data::{TestDataConfig, create_test_dump};
use placefinder::{
    EngineConfig, FreeTextRequest, ImportPipeline, MemoryIndex, PlaceDump, RequestOptions,
    ReverseRequest, SearchResponse, Searcher, StructuredAddress, StructuredRequest,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    placefinder::init_logging(tracing::Level::INFO)?;

    // A small sample dump with two countries
    let dump_file = create_test_dump(&TestDataConfig::sample())?;
    let source = Arc::new(PlaceDump::open(dump_file.path())?);
    let index = Arc::new(MemoryIndex::new());
    let config = EngineConfig::default();

    let stats = ImportPipeline::new(source, index.clone(), config.clone()).run()?;
    println!("Imported {} documents\n", stats.documents);

    let searcher = Searcher::builder(index).config(config).build()?;

    println!("Searching for 'Hauptstraße 3':");
    let response = searcher.search(&FreeTextRequest::new("Hauptstraße 3"))?;
    print_results(&response, 3);

    // Typos are forgiven by the lenient retry
    println!("\nSearching for 'Kerkstrat':");
    print_results(&searcher.search(&FreeTextRequest::new("Kerkstrat"))?, 3);

    println!("\nStructured search for city 'Berlin' in 'DE':");
    let address = StructuredAddress::default().country_code("DE").city("Berlin");
    print_results(&searcher.structured(&StructuredRequest::new(address))?, 3);

    println!("\nWhat is near 13.4012, 52.5212?");
    let request = ReverseRequest::new(Point::new(13.4012, 52.5212))?
        .radius_km(0.5)?
        .with_options(RequestOptions::new().limit(3));
    print_results(&searcher.reverse(&request)?, 3);

    Ok(())
}

fn print_results(response: &SearchResponse, limit: usize) {
    for (i, hit) in response.iter().take(limit).enumerate() {
        let tags = hit.localized_tags(&response.language);
        println!(
            "  {}. {} ({}) - Score: {:.3}, Id: {}",
            i + 1,
            hit.localized("name", &response.language)
                .or(tags.get("housenumber").map(String::as_str))
                .unwrap_or("Unknown"),
            tags.get("type").map_or("other", String::as_str),
            hit.score,
            hit.id
        );
    }

    if response.len() > limit {
        println!("  ... and {} more results", response.len() - limit);
    }
}
