//! In-process index backend.
//!
//! Writes land in a realtime map that `exists` and `delete` consult
//! directly. Searches run against the snapshot taken at the last
//! [`SearchIndex::refresh`], mirroring the near-realtime visibility of a
//! search cluster.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ahash::AHashMap as HashMap;
use rayon::prelude::*;
use tracing::{debug, instrument};

use super::scoring::{AnalyzedRecord, Evaluator};
use super::{BulkItemStatus, BulkResult, IndexError, IndexProperties, RankedHit, Result, SearchIndex};
use crate::config::ClassificationConfig;
use crate::document::IndexRecord;
use crate::query::RetrievalPlan;

#[derive(Debug, Default)]
struct State {
    latest: HashMap<String, Arc<AnalyzedRecord>>,
    searchable: Arc<Vec<Arc<AnalyzedRecord>>>,
    properties: Option<IndexProperties>,
}

#[derive(Debug, Default)]
pub struct MemoryIndex {
    state: RwLock<State>,
    classification: ClassificationConfig,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let configured classification terms match `#osm.<key>.<value>` tags.
    pub fn with_classification(mut self, classification: ClassificationConfig) -> Self {
        self.classification = classification;
        self
    }

    /// Number of records visible to searches.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.searchable.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| IndexError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| IndexError::Poisoned)
    }
}

impl SearchIndex for MemoryIndex {
    #[instrument(name = "Memory Search", skip_all, level = "debug", fields(limit = limit))]
    fn search(&self, plan: &RetrievalPlan, limit: usize) -> Result<Vec<RankedHit>> {
        let snapshot = Arc::clone(&self.read()?.searchable);
        let evaluator = Evaluator::new(&self.classification);
        let center = plan.sort.map(|sort| sort.center);

        let mut hits: Vec<(f32, f64, &AnalyzedRecord)> = snapshot
            .par_iter()
            .filter_map(|doc| {
                let score = evaluator.score(&plan.query, doc)?;
                let distance = match (center, doc.record.coordinate) {
                    (Some(center), Some(coordinate)) => coordinate.haversine_km(&center),
                    (Some(_), None) => f64::INFINITY,
                    (None, _) => 0.0,
                };
                Some((score, distance, doc.as_ref()))
            })
            .collect();

        hits.sort_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| b.0.total_cmp(&a.0))
                .then_with(|| a.2.record.id.cmp(&b.2.record.id))
        });
        let total = hits.len();
        hits.truncate(limit);
        debug!(candidates = snapshot.len(), matched = total, returned = hits.len(), "Evaluated plan");

        Ok(hits
            .into_iter()
            .map(|(score, _, doc)| RankedHit {
                id: doc.record.id.clone(),
                score,
                record: doc.record.clone(),
            })
            .collect())
    }

    fn bulk_upsert(&self, records: &[IndexRecord]) -> Result<BulkResult> {
        let analyzed: Vec<(String, Option<AnalyzedRecord>)> = records
            .par_iter()
            .map(|record| {
                let id = record.id.clone();
                (id, (!record.id.is_empty()).then(|| AnalyzedRecord::new(record.clone())))
            })
            .collect();

        let mut state = self.write()?;
        let items = analyzed
            .into_iter()
            .map(|(id, analyzed)| match analyzed {
                Some(doc) => {
                    state.latest.insert(id.clone(), Arc::new(doc));
                    BulkItemStatus { id, error: None }
                }
                None => BulkItemStatus {
                    id,
                    error: Some("record without id".to_string()),
                },
            })
            .collect();
        Ok(BulkResult { items })
    }

    fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.write()?.latest.remove(id).is_some())
    }

    fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.read()?.latest.contains_key(id))
    }

    fn refresh(&self) -> Result<()> {
        let mut state = self.write()?;
        state.searchable = Arc::new(state.latest.values().cloned().collect());
        debug!(records = state.searchable.len(), "Refreshed memory index");
        Ok(())
    }

    fn load_properties(&self) -> Result<Option<IndexProperties>> {
        Ok(self.read()?.properties.clone())
    }

    fn save_properties(&self, properties: &IndexProperties) -> Result<()> {
        self.write()?.properties = Some(properties.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::document::{NameMap, PlaceDocument, RecordContext};
    use crate::query::plan::{Clause, MatchClause, fields};
    use placefinder_data_processing::Point;

    fn record(id: &str, name: &str, importance: f64, at: Point) -> IndexRecord {
        let doc = PlaceDocument::builder(1, "N", 1, "place", "village")
            .names(NameMap::new().with("default", name))
            .importance(importance)
            .rank_address(16)
            .centroid(at)
            .finish();
        IndexRecord::from_document(id.to_string(), &doc, &RecordContext::default())
    }

    fn index() -> MemoryIndex {
        let index = MemoryIndex::new();
        index
            .bulk_upsert(&[
                record("1", "Muffle Flu", 0.1, Point::new(10.0, 50.0)),
                record("2", "Muffle Flu Grand", 0.9, Point::new(10.5, 50.0)),
                record("3", "Elsewhere", 0.5, Point::new(10.01, 50.0)),
            ])
            .unwrap();
        index
    }

    #[test]
    fn test_writes_need_refresh() {
        let index = index();
        assert!(index.exists("1").unwrap());
        assert!(index.is_empty().unwrap());
        assert!(index.search(&RetrievalPlan::new(Clause::MatchAll), 10).unwrap().is_empty());

        index.refresh().unwrap();
        assert_eq!(index.len().unwrap(), 3);
        assert!(index.delete("1").unwrap());
        assert!(!index.delete("1").unwrap());
        assert!(!index.exists("1").unwrap());
        assert_eq!(index.search(&RetrievalPlan::new(Clause::MatchAll), 10).unwrap().len(), 3);
        index.refresh().unwrap();
        assert_eq!(index.len().unwrap(), 2);
    }

    #[test]
    fn test_ranking_and_limit() {
        let index = index();
        index.refresh().unwrap();
        let plan = RetrievalPlan::new(MatchClause::new(fields::COLLECTOR_NAME, "muffle flu grand").build());
        let hits = index.search(&plan, 10).unwrap();
        assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["2", "1"]);
        assert!(hits[0].score > hits[1].score);
        assert_eq!(index.search(&plan, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_distance_sort() {
        let index = index();
        index.refresh().unwrap();
        let plan = RetrievalPlan::new(Clause::MatchAll).sorted_by_distance(Point::new(10.0, 50.0));
        let hits = index.search(&plan, 10).unwrap();
        assert_eq!(hits.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["1", "3", "2"]);
    }

    #[test]
    fn test_bulk_reports_per_record_errors() {
        let index = MemoryIndex::new();
        let result = index
            .bulk_upsert(&[
                record("", "Nameless", 0.1, Point::new(0.0, 0.0)),
                record("5", "Named", 0.1, Point::new(0.0, 0.0)),
            ])
            .unwrap();
        assert!(result.has_errors());
        assert_eq!(result.failed().count(), 1);
        assert!(index.exists("5").unwrap());
    }

    #[test]
    fn test_properties_round_trip() {
        let index = MemoryIndex::new();
        assert!(index.load_properties().unwrap().is_none());
        let props = IndexProperties::for_config(&EngineConfig::default());
        index.save_properties(&props).unwrap();
        assert_eq!(index.load_properties().unwrap(), Some(props));
    }
}
