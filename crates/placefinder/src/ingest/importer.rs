use std::sync::Arc;

use chrono::Utc;
use itertools::Itertools;
use tracing::{debug, error, info, instrument, warn};

use super::Result;
use crate::config::EngineConfig;
use crate::document::{IndexRecord, PlaceDocument, RecordContext, document_id};
use crate::index::{IndexProperties, SearchIndex};

/// Failed bulk items whose document body is logged.
const MAX_LOGGED_DOCUMENTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportStats {
    /// Documents handed to the index.
    pub documents: usize,
    /// Documents the index rejected or never received.
    pub failed: usize,
    /// Documents skipped because nothing could find them.
    pub skipped: usize,
    pub batches: usize,
}

impl ImportStats {
    pub const fn merge(self, other: Self) -> Self {
        Self {
            documents: self.documents + other.documents,
            failed: self.failed + other.failed,
            skipped: self.skipped + other.skipped,
            batches: self.batches + other.batches,
        }
    }
}

/// Buffers documents and writes them to the index in bulk.
///
/// One importer per worker; importers over the same index share nothing but
/// the index handle.
pub struct Importer {
    index: Arc<dyn SearchIndex>,
    context: RecordContext,
    batch_size: usize,
    batch: Vec<IndexRecord>,
    stats: ImportStats,
}

impl Importer {
    pub fn new(index: Arc<dyn SearchIndex>, config: &EngineConfig) -> Self {
        Self {
            index,
            context: RecordContext::from_config(config),
            batch_size: config.bulk_batch_size.max(1),
            batch: Vec::with_capacity(config.bulk_batch_size.clamp(1, 10_000)),
            stats: ImportStats::default(),
        }
    }

    pub const fn stats(&self) -> ImportStats {
        self.stats
    }

    /// Queue the documents of one place.
    ///
    /// The n-th indexed document gets id `{place_id}.{n}` (plain
    /// `{place_id}` for the first). Documents nobody could find are skipped
    /// without using up a number, so ids of a place never have gaps.
    pub fn add(&mut self, documents: &[PlaceDocument]) {
        let mut object_id = 0_u32;
        for doc in documents {
            if !doc.is_useful_for_index() {
                self.stats.skipped += 1;
                continue;
            }
            let id = document_id(doc.place_id(), object_id);
            object_id += 1;
            self.batch.push(IndexRecord::from_document(id, doc, &self.context));
            if self.batch.len() >= self.batch_size {
                self.flush();
            }
        }
    }

    /// Write out the pending batch.
    #[instrument(name = "Bulk Flush", skip_all, level = "debug", fields(size = self.batch.len()))]
    pub fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.batch);
        self.stats.batches += 1;
        self.stats.documents += batch.len();

        match self.index.bulk_upsert(&batch) {
            Ok(result) if result.has_errors() => {
                let failed = result.failed().collect_vec();
                self.stats.failed += failed.len();
                for (n, item) in failed.iter().enumerate() {
                    let body = (n < MAX_LOGGED_DOCUMENTS)
                        .then(|| batch.iter().find(|r| r.id == item.id))
                        .flatten()
                        .and_then(|r| serde_json::to_string(r).ok());
                    warn!(
                        id = %item.id,
                        error = item.error.as_deref().unwrap_or_default(),
                        document = body.as_deref().unwrap_or_default(),
                        "Bulk write failed for document"
                    );
                }
            }
            Ok(_) => debug!(documents = batch.len(), "Flushed batch"),
            Err(err) => {
                self.stats.failed += batch.len();
                error!(
                    error = %err,
                    documents = batch.len(),
                    first_id = batch.first().map(|r| r.id.as_str()).unwrap_or_default(),
                    "Bulk write failed, dropping batch"
                );
            }
        }
    }

    /// Flush what is left and hand back the counters.
    pub fn into_stats(mut self) -> ImportStats {
        self.flush();
        self.stats
    }

    /// Flush, make everything searchable and store the index properties.
    #[instrument(name = "Finish Import", skip_all, level = "info")]
    pub fn finish(self, config: &EngineConfig) -> Result<ImportStats> {
        let index = Arc::clone(&self.index);
        let stats = self.into_stats();
        finalize_import(index.as_ref(), config)?;
        Ok(stats)
    }
}

/// Refresh the index and record what it was imported with.
pub(super) fn finalize_import(index: &dyn SearchIndex, config: &EngineConfig) -> Result<()> {
    index.refresh()?;
    let properties = IndexProperties::for_config(config).with_import_date(Utc::now());
    index.save_properties(&properties)?;
    info!(version = %properties.database_version, "Stored index properties");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NameMap;
    use crate::index::{BulkItemStatus, BulkResult, IndexError, MemoryIndex, RankedHit};
    use crate::query::RetrievalPlan;

    fn place(place_id: i64, name: Option<&str>, house_number: Option<&str>) -> PlaceDocument {
        let mut builder = PlaceDocument::builder(place_id, "N", place_id, "place", "yes").house_number(house_number);
        if let Some(name) = name {
            builder = builder.names(NameMap::new().with("default", name));
        }
        builder.finish()
    }

    fn config(batch: usize) -> EngineConfig {
        EngineConfig::builder().bulk_batch_size(batch).build().unwrap()
    }

    #[test]
    fn test_ids_batches_and_skips() {
        let index = Arc::new(MemoryIndex::new());
        let mut importer = Importer::new(index.clone(), &config(2));
        importer.add(&[
            place(7, Some("A"), None),
            place(7, None, None),
            place(7, None, Some("3")),
        ]);
        assert_eq!(importer.stats().batches, 1);
        importer.add(&[place(8, Some("B"), None)]);

        let stats = importer.finish(&config(2)).unwrap();
        assert_eq!(stats.documents, 3);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.batches, 2);
        for id in ["7", "7.1", "8"] {
            assert!(index.exists(id).unwrap(), "{id}");
        }
        assert!(!index.exists("7.2").unwrap());
        assert_eq!(index.len().unwrap(), 3);

        let properties = index.load_properties().unwrap().unwrap();
        assert!(properties.import_date.is_some());
        assert!(properties.check_version().is_ok());
    }

    /// Rejects every other record and fails whole batches on demand.
    struct FlakyIndex {
        fail_all: bool,
    }

    impl SearchIndex for FlakyIndex {
        fn search(&self, _plan: &RetrievalPlan, _limit: usize) -> crate::index::Result<Vec<RankedHit>> {
            Ok(Vec::new())
        }

        fn bulk_upsert(&self, records: &[IndexRecord]) -> crate::index::Result<BulkResult> {
            if self.fail_all {
                return Err(IndexError::Backend {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            let items = records
                .iter()
                .enumerate()
                .map(|(n, r)| BulkItemStatus {
                    id: r.id.clone(),
                    error: (n % 2 == 1).then(|| "mapper_parsing_exception".to_string()),
                })
                .collect();
            Ok(BulkResult { items })
        }

        fn delete(&self, _id: &str) -> crate::index::Result<bool> {
            Ok(false)
        }

        fn exists(&self, _id: &str) -> crate::index::Result<bool> {
            Ok(false)
        }

        fn refresh(&self) -> crate::index::Result<()> {
            Ok(())
        }

        fn load_properties(&self) -> crate::index::Result<Option<IndexProperties>> {
            Ok(None)
        }

        fn save_properties(&self, _properties: &IndexProperties) -> crate::index::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failures_do_not_abort() {
        let mut importer = Importer::new(Arc::new(FlakyIndex { fail_all: false }), &config(10));
        importer.add(&(1..=4).map(|id| place(id, Some("X"), None)).collect_vec());
        let stats = importer.into_stats();
        assert_eq!((stats.documents, stats.failed), (4, 2));

        let mut importer = Importer::new(Arc::new(FlakyIndex { fail_all: true }), &config(2));
        importer.add(&(1..=3).map(|id| place(id, Some("X"), None)).collect_vec());
        let stats = importer.finish(&config(2)).unwrap();
        assert_eq!((stats.documents, stats.failed, stats.batches), (3, 3, 2));
    }
}
