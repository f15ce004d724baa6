use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use placefinder::data_processing::Point;
use placefinder::index::Result;
use placefinder::{
    BulkResult, EngineConfig, FreeTextRequest, Importer, IndexProperties, IndexRecord, MemoryIndex,
    NameMap, PlaceDocument, RankedHit, RequestOptions, RetrievalPlan, ReverseRequest, SearchIndex,
    Searcher,
};

struct Place {
    id: i64,
    name: &'static str,
    key: &'static str,
    value: &'static str,
    importance: f64,
    at: Point,
    categories: &'static [&'static str],
}

impl Place {
    const fn new(id: i64, name: &'static str) -> Self {
        Self {
            id,
            name,
            key: "place",
            value: "village",
            importance: 0.0,
            at: Point::new(10.0, 50.0),
            categories: &[],
        }
    }

    fn document(&self) -> PlaceDocument {
        let mut builder = PlaceDocument::builder(self.id, "N", self.id, self.key, self.value)
            .names(NameMap::new().with("default", self.name))
            .importance(self.importance)
            .rank_address(16)
            .centroid(self.at);
        if !self.categories.is_empty() {
            builder = builder.categories(self.categories.iter().copied());
        }
        builder.finish()
    }
}

fn searcher(places: &[Place]) -> Searcher {
    let _ = placefinder::init_logging(tracing::Level::WARN);
    let config = EngineConfig::default();
    let index = Arc::new(MemoryIndex::new());
    let mut importer = Importer::new(index.clone(), &config);
    for place in places {
        importer.add(&[place.document()]);
    }
    importer.finish(&config).unwrap();
    Searcher::builder(index).config(config).build().unwrap()
}

fn ids(searcher: &Searcher, request: &FreeTextRequest) -> Vec<String> {
    searcher
        .search(request)
        .unwrap()
        .hits
        .into_iter()
        .map(|hit| hit.id)
        .collect()
}

fn query(searcher: &Searcher, text: &str) -> Vec<String> {
    ids(searcher, &FreeTextRequest::new(text))
}

#[test]
fn test_name_without_address_is_found() {
    let searcher = searcher(&[Place::new(1, "Muffle Flu")]);

    assert_eq!(query(&searcher, "muffle"), vec!["1"]);
    assert_eq!(query(&searcher, "flu"), vec!["1"]);
    assert_eq!(query(&searcher, "mufle flu"), vec!["1"]);
    assert!(query(&searcher, "huffle fluff").is_empty());
}

#[test]
fn test_importance_decides_between_equal_names() {
    let searcher = searcher(&[
        Place {
            importance: 0.0,
            ..Place::new(1, "Berlin")
        },
        Place {
            importance: 0.5,
            ..Place::new(2, "Berlin")
        },
    ]);

    assert_eq!(query(&searcher, "berlin"), vec!["2", "1"]);
}

#[test]
fn test_reverse_radius_and_distance_sort() {
    let searcher = searcher(&[
        Place {
            at: Point::new(10.1, 50.0),
            ..Place::new(3, "Far")
        },
        Place {
            at: Point::new(10.0, 50.0),
            ..Place::new(1, "Center")
        },
        Place {
            at: Point::new(10.01, 50.0),
            ..Place::new(2, "Near")
        },
    ]);
    let center = Point::new(10.0, 50.0);

    let request = ReverseRequest::new(center)
        .unwrap()
        .radius_km(0.1)
        .unwrap()
        .with_options(RequestOptions::new().limit(10));
    assert_eq!(searcher.reverse(&request).unwrap().ids(), vec!["1"]);

    let request = ReverseRequest::new(center)
        .unwrap()
        .radius_km(20.0)
        .unwrap()
        .distance_sort(true)
        .with_options(RequestOptions::new().limit(2));
    assert_eq!(searcher.reverse(&request).unwrap().ids(), vec!["1", "2"]);

    let request = ReverseRequest::new(center).unwrap().radius_km(20.0).unwrap();
    assert_eq!(searcher.reverse(&request).unwrap().len(), 1);
}

#[test]
fn test_category_include_is_or_and_excludes_accumulate() {
    let searcher = searcher(&[
        Place {
            categories: &["test.a"],
            ..Place::new(1, "Alpha")
        },
        Place {
            categories: &["test.b"],
            ..Place::new(2, "Alpha")
        },
        Place {
            categories: &["test.c"],
            ..Place::new(3, "Alpha")
        },
    ]);

    let mut found = ids(
        &searcher,
        &FreeTextRequest::new("alpha")
            .with_options(RequestOptions::new().include_categories("test.a,test.b").unwrap()),
    );
    found.sort();
    assert_eq!(found, vec!["1", "2"]);

    let options = RequestOptions::new()
        .exclude_categories("test.a")
        .unwrap()
        .exclude_categories("test.b")
        .unwrap();
    assert_eq!(ids(&searcher, &FreeTextRequest::new("alpha").with_options(options)), vec!["3"]);

    let options = RequestOptions::new().include_categories("test.c").unwrap();
    assert_eq!(ids(&searcher, &FreeTextRequest::new("").with_options(options)), vec!["3"]);
}

#[test]
fn test_tag_filter_and_layers() {
    let searcher = searcher(&[
        Place {
            key: "amenity",
            value: "cafe",
            ..Place::new(1, "Kranzler")
        },
        Place::new(2, "Kranzler"),
    ]);

    let cafes = RequestOptions::new().osm_tag("amenity:cafe").unwrap();
    assert_eq!(ids(&searcher, &FreeTextRequest::new("kranzler").with_options(cafes)), vec!["1"]);

    let no_amenity = RequestOptions::new().osm_tag("!amenity").unwrap();
    assert_eq!(
        ids(&searcher, &FreeTextRequest::new("kranzler").with_options(no_amenity)),
        vec!["2"]
    );

    let cities = RequestOptions::new().layers(["city"]).unwrap();
    assert_eq!(query(&searcher, "kranzler").len(), 2);
    assert_eq!(ids(&searcher, &FreeTextRequest::new("kranzler").with_options(cities)).len(), 2);

    let streets = RequestOptions::new().layers(["street"]).unwrap();
    assert!(ids(&searcher, &FreeTextRequest::new("kranzler").with_options(streets)).is_empty());
}

#[test]
fn test_bad_requests() {
    let searcher = searcher(&[Place::new(1, "Muffle Flu")]);

    let err = searcher.search(&FreeTextRequest::new("")).unwrap_err();
    assert!(err.is_bad_request());
    assert!(RequestOptions::new().osm_tag("amenity:").is_err());
    assert!(RequestOptions::new().layers(["planet"]).is_err());
    assert!(RequestOptions::new().bbox_str("1,2,3").is_err());
    assert!(ReverseRequest::new(Point::new(10.0, 95.0)).is_err());
}

/// An adapter defined outside the crate, counting the searches it serves.
#[derive(Default)]
struct CountingIndex {
    inner: MemoryIndex,
    searches: AtomicUsize,
}

impl SearchIndex for CountingIndex {
    fn search(&self, plan: &RetrievalPlan, limit: usize) -> Result<Vec<RankedHit>> {
        self.searches.fetch_add(1, Ordering::Relaxed);
        self.inner.search(plan, limit)
    }

    fn bulk_upsert(&self, records: &[IndexRecord]) -> Result<BulkResult> {
        self.inner.bulk_upsert(records)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id)
    }

    fn exists(&self, id: &str) -> Result<bool> {
        self.inner.exists(id)
    }

    fn refresh(&self) -> Result<()> {
        self.inner.refresh()
    }

    fn load_properties(&self) -> Result<Option<IndexProperties>> {
        self.inner.load_properties()
    }

    fn save_properties(&self, properties: &IndexProperties) -> Result<()> {
        self.inner.save_properties(properties)
    }
}

#[test]
fn test_custom_index_adapter() {
    let config = EngineConfig::default();
    let index = Arc::new(CountingIndex::default());
    let mut importer = Importer::new(index.clone(), &config);
    importer.add(&[Place::new(1, "Muffle Flu").document()]);
    importer.finish(&config).unwrap();

    let searcher = Searcher::builder(index.clone()).config(config).build().unwrap();
    assert_eq!(query(&searcher, "muffle"), vec!["1"]);
    assert_eq!(index.searches.load(Ordering::Relaxed), 1);
}
