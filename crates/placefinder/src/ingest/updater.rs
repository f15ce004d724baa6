use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, error, instrument, warn};

use super::Result;
use crate::config::EngineConfig;
use crate::document::{IndexRecord, PlaceDocument, RecordContext, document_id};
use crate::index::SearchIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Documents the index rejected.
    pub failed: usize,
}

/// Applies changes of single places to a live index.
///
/// A place may produce fewer documents than it did before, so every write
/// probes the index for leftover sub-documents and deletes them one by one.
pub struct Updater {
    index: Arc<dyn SearchIndex>,
    context: RecordContext,
    stats: UpdateStats,
}

impl Updater {
    pub fn new(index: Arc<dyn SearchIndex>, config: &EngineConfig) -> Self {
        Self {
            index,
            context: RecordContext::from_config(config),
            stats: UpdateStats::default(),
        }
    }

    pub const fn stats(&self) -> UpdateStats {
        self.stats
    }

    /// Replace all documents of `place_id` with `documents`.
    ///
    /// An empty (or entirely unsearchable) list removes the place. A failed
    /// bulk write is logged and the place is left as it was.
    pub fn add_or_update(&mut self, place_id: i64, documents: &[PlaceDocument]) -> Result<()> {
        let existed = self.index.exists(&document_id(place_id, 0))?;

        let records: Vec<IndexRecord> = documents
            .iter()
            .filter(|doc| doc.is_useful_for_index())
            .zip(0_u32..)
            .map(|(doc, object_id)| IndexRecord::from_document(document_id(place_id, object_id), doc, &self.context))
            .collect();
        if !records.is_empty() {
            match self.index.bulk_upsert(&records) {
                Ok(result) => {
                    for item in result.failed() {
                        self.stats.failed += 1;
                        warn!(
                            id = %item.id,
                            error = item.error.as_deref().unwrap_or_default(),
                            "Update failed for document"
                        );
                    }
                }
                Err(err) => {
                    self.stats.failed += records.len();
                    error!(
                        error = %err,
                        place_id,
                        ids = %records.iter().map(|r| r.id.as_str()).join(","),
                        "Bulk write failed, skipping place"
                    );
                    return Ok(());
                }
            }
        }

        let next = u32::try_from(records.len()).unwrap_or(u32::MAX);
        let removed = self.delete_from(place_id, next)?;
        match (records.is_empty(), existed) {
            (false, true) => self.stats.updated += 1,
            (false, false) => self.stats.created += 1,
            (true, true) => self.stats.deleted += 1,
            (true, false) => {}
        }
        debug!(place_id, documents = records.len(), removed, "Updated place");
        Ok(())
    }

    /// Remove every document of `place_id`.
    pub fn delete(&mut self, place_id: i64) -> Result<()> {
        if self.delete_from(place_id, 0)? > 0 {
            self.stats.deleted += 1;
        }
        Ok(())
    }

    /// Delete `{place_id}.{n}` for `n = from, from + 1, ...` until one does
    /// not exist. Returns the number of deleted documents.
    fn delete_from(&self, place_id: i64, from: u32) -> Result<usize> {
        let mut removed = 0;
        for object_id in from.. {
            let id = document_id(place_id, object_id);
            if !self.index.exists(&id)? {
                break;
            }
            self.index.delete(&id)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Make all changes searchable.
    #[instrument(name = "Finish Update", skip_all, level = "info")]
    pub fn finish(self) -> Result<UpdateStats> {
        self.index.refresh()?;
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NameMap;
    use crate::index::{BulkResult, IndexError, IndexProperties, MemoryIndex, RankedHit};
    use crate::ingest::Importer;
    use crate::query::RetrievalPlan;

    fn docs(place_id: i64, house_numbers: &[&str]) -> Vec<PlaceDocument> {
        let base = PlaceDocument::builder(place_id, "N", place_id, "building", "yes")
            .names(NameMap::new().with("default", "Haus"))
            .finish();
        house_numbers.iter().map(|hn| base.with_house_number(hn)).collect()
    }

    #[test]
    fn test_shrinking_place_loses_sub_documents() {
        let index = Arc::new(MemoryIndex::new());
        let mut updater = Updater::new(index.clone(), &EngineConfig::default());

        updater.add_or_update(5, &docs(5, &["1", "3", "5"])).unwrap();
        assert!(index.exists("5.2").unwrap());

        updater.add_or_update(5, &docs(5, &["1"])).unwrap();
        assert!(index.exists("5").unwrap());
        assert!(!index.exists("5.1").unwrap());
        assert!(!index.exists("5.2").unwrap());

        let stats = updater.finish().unwrap();
        assert_eq!((stats.created, stats.updated, stats.deleted), (1, 1, 0));
        assert_eq!(index.len().unwrap(), 1);
    }

    /// Two searchable documents around one nobody could find.
    fn gapped(place_id: i64) -> Vec<PlaceDocument> {
        let unnamed = PlaceDocument::builder(place_id, "N", place_id, "building", "yes").finish();
        let mut documents = docs(place_id, &["1"]);
        documents.push(unnamed);
        documents.extend(docs(place_id, &["3"]));
        documents
    }

    #[test]
    fn test_unsearchable_documents_leave_no_id_gaps() {
        let index = Arc::new(MemoryIndex::new());
        let config = EngineConfig::default();

        let mut importer = Importer::new(index.clone(), &config);
        importer.add(&gapped(7));
        importer.finish(&config).unwrap();
        assert!(index.exists("7.1").unwrap());
        assert!(!index.exists("7.2").unwrap());

        let mut updater = Updater::new(index.clone(), &config);
        updater.add_or_update(5, &docs(5, &["1", "3", "5"])).unwrap();
        updater.add_or_update(5, &gapped(5)).unwrap();
        assert!(index.exists("5.1").unwrap());
        assert!(!index.exists("5.2").unwrap());

        updater.delete(7).unwrap();
        updater.finish().unwrap();
        assert!(!index.exists("7").unwrap());
        assert!(!index.exists("7.1").unwrap());
    }

    /// Reads from a real index but cannot take writes.
    struct ReadOnlyIndex(Arc<MemoryIndex>);

    impl SearchIndex for ReadOnlyIndex {
        fn search(&self, plan: &RetrievalPlan, limit: usize) -> crate::index::Result<Vec<RankedHit>> {
            self.0.search(plan, limit)
        }

        fn bulk_upsert(&self, _records: &[IndexRecord]) -> crate::index::Result<BulkResult> {
            Err(IndexError::Backend {
                status: 503,
                message: "unavailable".to_string(),
            })
        }

        fn delete(&self, id: &str) -> crate::index::Result<bool> {
            self.0.delete(id)
        }

        fn exists(&self, id: &str) -> crate::index::Result<bool> {
            self.0.exists(id)
        }

        fn refresh(&self) -> crate::index::Result<()> {
            self.0.refresh()
        }

        fn load_properties(&self) -> crate::index::Result<Option<IndexProperties>> {
            self.0.load_properties()
        }

        fn save_properties(&self, properties: &IndexProperties) -> crate::index::Result<()> {
            self.0.save_properties(properties)
        }
    }

    #[test]
    fn test_failed_bulk_write_keeps_place_and_continues() {
        let memory = Arc::new(MemoryIndex::new());
        let config = EngineConfig::default();
        let mut importer = Importer::new(memory.clone(), &config);
        importer.add(&docs(7, &["1", "3"]));
        importer.finish(&config).unwrap();

        let index = Arc::new(ReadOnlyIndex(memory));
        let mut updater = Updater::new(index.clone(), &config);
        updater.add_or_update(7, &docs(7, &["1"])).unwrap();
        updater.add_or_update(8, &docs(8, &["2"])).unwrap();

        let stats = updater.finish().unwrap();
        assert_eq!(stats.failed, 2);
        assert_eq!((stats.created, stats.updated, stats.deleted), (0, 0, 0));
        assert!(index.exists("7.1").unwrap());
    }

    #[test]
    fn test_delete_and_empty_update() {
        let index = Arc::new(MemoryIndex::new());
        let mut updater = Updater::new(index.clone(), &EngineConfig::default());
        updater.add_or_update(5, &docs(5, &["1", "3"])).unwrap();
        updater.add_or_update(6, &docs(6, &["2"])).unwrap();

        updater.delete(5).unwrap();
        assert!(!index.exists("5").unwrap());
        assert!(!index.exists("5.1").unwrap());

        updater.add_or_update(6, &[]).unwrap();
        assert!(!index.exists("6").unwrap());

        updater.delete(99).unwrap();
        let stats = updater.finish().unwrap();
        assert_eq!((stats.created, stats.deleted), (2, 2));
        assert!(index.is_empty().unwrap());
    }
}
