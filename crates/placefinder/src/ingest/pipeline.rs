//! Import and update runs over a place source.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};
use placefinder_data_processing::{PlaceSource, PlaceUpdate, collapse_updates, read_update_log};
use rayon::prelude::*;
use tracing::{info, instrument, warn};

use super::importer::{ImportStats, Importer, finalize_import};
use super::updater::{UpdateStats, Updater};
use super::{IngestError, Result};
use crate::config::EngineConfig;
use crate::document::DocumentFactory;
use crate::index::SearchIndex;

/// Workers report progress every this many documents.
const PROGRESS_LOG_INTERVAL: usize = 50_000;

/// Full import of a place source, partitioned by country.
///
/// A fixed pool of `import_threads` workers pulls country codes from a
/// shared queue. Each worker reads its countries from the source and writes
/// through its own [`Importer`].
pub struct ImportPipeline {
    source: Arc<dyn PlaceSource>,
    index: Arc<dyn SearchIndex>,
    config: EngineConfig,
    countries: Option<Vec<String>>,
    show_progress: bool,
}

impl ImportPipeline {
    pub fn new(source: Arc<dyn PlaceSource>, index: Arc<dyn SearchIndex>, config: EngineConfig) -> Self {
        Self {
            source,
            index,
            config,
            countries: None,
            show_progress: true,
        }
    }

    /// Import only these countries instead of every country in the source.
    #[must_use]
    pub fn countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.countries = Some(
            countries
                .into_iter()
                .map(|cc| cc.as_ref().to_lowercase())
                .collect(),
        );
        self
    }

    /// Show a progress bar on the terminal.
    #[must_use]
    pub const fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    #[instrument(name = "Import", skip_all, level = "info")]
    pub fn run(&self) -> Result<ImportStats> {
        let countries = match &self.countries {
            Some(countries) => countries.clone(),
            None => self.source.country_codes()?,
        };
        let threads = self.config.import_threads.max(1);
        info!(countries = countries.len(), threads, "Starting import");

        let queue = Mutex::new(VecDeque::from(countries));
        let progress = self.progress_bar();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;

        let stats = pool.install(|| {
            (0..threads)
                .into_par_iter()
                .map(|worker| self.worker(worker, &queue, &progress))
                .try_reduce(ImportStats::default, |a, b| Ok(a.merge(b)))
        })?;
        progress.finish_and_clear();

        finalize_import(self.index.as_ref(), &self.config)?;
        info!(
            documents = stats.documents,
            failed = stats.failed,
            skipped = stats.skipped,
            batches = stats.batches,
            "Import finished"
        );
        Ok(stats)
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} documents ({per_sec}) {msg}")
                .expect("Progress bar template"),
        );
        pb
    }

    fn worker(&self, worker: usize, queue: &Mutex<VecDeque<String>>, progress: &ProgressBar) -> Result<ImportStats> {
        let factory = DocumentFactory::new(&self.config);
        let mut importer = Importer::new(Arc::clone(&self.index), &self.config);
        let mut written = 0_usize;

        loop {
            let next = queue.lock().map_err(|_| IngestError::Poisoned)?.pop_front();
            let Some(country) = next else { break };
            progress.set_message(country.clone());

            let places = self.source.places_for_country(&country)?;
            let country_names = self.source.country_names(&country)?;
            info!(worker, country = %country, places = places.len(), "Importing country");

            for place in &places {
                let documents = factory.documents(place, country_names.as_ref());
                importer.add(&documents);
                progress.inc(documents.len() as u64);

                let before = written;
                written += documents.len();
                if written / PROGRESS_LOG_INTERVAL > before / PROGRESS_LOG_INTERVAL {
                    info!(worker, documents = written, "Import progress");
                }
            }
        }
        Ok(importer.into_stats())
    }
}

/// Applies a log of place changes to an existing index.
pub struct UpdatePipeline {
    source: Arc<dyn PlaceSource>,
    index: Arc<dyn SearchIndex>,
    config: EngineConfig,
}

impl UpdatePipeline {
    pub fn new(source: Arc<dyn PlaceSource>, index: Arc<dyn SearchIndex>, config: EngineConfig) -> Self {
        Self { source, index, config }
    }

    /// Read the update log at `path` and apply it.
    pub fn run_log(&self, path: impl AsRef<Path>) -> Result<UpdateStats> {
        self.run(read_update_log(path)?)
    }

    /// Apply the newest update of every place.
    ///
    /// Upserts re-read the place from the source; a place the source no
    /// longer has is deleted.
    #[instrument(name = "Update", skip_all, level = "info")]
    pub fn run(&self, updates: Vec<PlaceUpdate>) -> Result<UpdateStats> {
        let updates = collapse_updates(updates);
        info!(places = updates.len(), "Applying updates");

        let factory = DocumentFactory::new(&self.config);
        let mut updater = Updater::new(Arc::clone(&self.index), &self.config);
        let mut country_names: BTreeMap<String, Option<BTreeMap<String, String>>> = BTreeMap::new();

        for update in &updates {
            if update.is_delete() {
                updater.delete(update.place_id)?;
                continue;
            }
            let Some(place) = self.source.place_by_id(update.place_id)? else {
                warn!(place_id = update.place_id, "Place is gone from the source, deleting it");
                updater.delete(update.place_id)?;
                continue;
            };

            let country = place.country_code.as_deref().unwrap_or_default().to_lowercase();
            if !country_names.contains_key(&country) {
                let names = self.source.country_names(&country)?;
                country_names.insert(country.clone(), names);
            }
            let names = country_names.get(&country).and_then(Option::as_ref);
            updater.add_or_update(place.place_id, &factory.documents(&place, names))?;
        }

        let stats = updater.finish()?;
        info!(
            created = stats.created,
            updated = stats.updated,
            deleted = stats.deleted,
            failed = stats.failed,
            "Update finished"
        );
        Ok(stats)
    }
}
