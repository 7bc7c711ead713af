//! Incremental cache coordinator: hit/miss classification and write-back.
//!
//! A request spans many comparison folders, but each cache entry covers a
//! single (GT, folder) pair. The coordinator decides per folder whether a
//! usable entry exists, hands back the cached results for hits, and after
//! the caller has computed the misses, writes one entry per folder.
//!
//! Reads never fail: any I/O or parse problem is logged and the folder is
//! reported as a miss. Writes are per folder and independent; a failure is
//! collected in the [`CommitReport`] and the remaining folders are still
//! written.

pub mod merge;

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::cache::entry::CachedComparisonEntry;
use crate::cache::index::GtIndex;
use crate::cache::key::CacheKey;
use crate::cache::store::FileStore;
use crate::models::{BaseFolderPaths, ComparisonFolder, MethodName, PerFileResult};

pub use merge::merge;

/// A folder served from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub folder: ComparisonFolder,
    /// Entry document the results came from.
    pub file_name: String,
    /// Results with scores filed under the folder's current name.
    pub results: Vec<PerFileResult>,
}

/// Outcome of [`IncrementalCacheCoordinator::classify`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    /// Hits, in request order.
    pub hits: Vec<CacheHit>,
    /// Folders that must be computed, in request order.
    pub misses: Vec<ComparisonFolder>,
}

impl Classification {
    /// Everything requested was cached.
    pub fn is_complete(&self) -> bool {
        self.misses.is_empty()
    }

    /// Cached results of all hits folded into one record per file.
    pub fn merged(&self) -> Vec<PerFileResult> {
        let groups: Vec<&[PerFileResult]> = self.hits.iter().map(|h| h.results.as_slice()).collect();
        merge(&groups)
    }
}

/// A folder whose entry could not be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFailure {
    pub folder: String,
    pub error: String,
}

/// Outcome of [`IncrementalCacheCoordinator::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Folders persisted.
    pub written: Vec<String>,
    /// Folders with no scores in the fresh results; nothing was written.
    pub skipped: Vec<String>,
    pub failures: Vec<CommitFailure>,
}

impl CommitReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable warnings for failed or skipped folders.
    pub fn warnings(&self) -> Vec<String> {
        let failed = self
            .failures
            .iter()
            .map(|f| format!("could not cache results for `{}`: {}", f.folder, f.error));
        let skipped = self
            .skipped
            .iter()
            .map(|name| format!("no results for `{name}`, nothing cached"));
        failed.chain(skipped).collect()
    }
}

/// Classifies requests against, and writes results into, one [`FileStore`].
pub struct IncrementalCacheCoordinator<'a> {
    store: &'a FileStore,
}

impl<'a> IncrementalCacheCoordinator<'a> {
    pub fn new(store: &'a FileStore) -> Self {
        Self { store }
    }

    /// Split `requested` into cached hits and folders that must be computed.
    ///
    /// Hits are refreshed: the index record and the entry document get a new
    /// access time. A failed refresh is logged and does not affect the hit.
    pub async fn classify(&self, base: &BaseFolderPaths, requested: &[ComparisonFolder]) -> Classification {
        let index = self.store.load_index().await;
        let now = Utc::now();
        let mut classification = Classification::default();

        for folder in requested {
            match self.resolve_hit(&index, base, folder, now).await {
                Some(hit) => classification.hits.push(hit),
                None => classification.misses.push(folder.clone()),
            }
        }

        if !classification.hits.is_empty() {
            let touched: Vec<&Path> = classification.hits.iter().map(|h| h.folder.path.as_path()).collect();
            let result = self
                .store
                .update_index(|index| {
                    for path in &touched {
                        index.touch(&base.gt, path, now);
                    }
                })
                .await;
            if let Err(e) = result {
                warn!(error = %e, "failed to refresh GT index access times");
            }
        }

        debug!(
            gt = %base.gt.display(),
            hits = classification.hits.len(),
            misses = classification.misses.len(),
            "classified comparison request"
        );
        classification
    }

    async fn resolve_hit(
        &self,
        index: &GtIndex,
        base: &BaseFolderPaths,
        folder: &ComparisonFolder,
        now: DateTime<Utc>,
    ) -> Option<CacheHit> {
        let record = index.lookup(&base.gt, &folder.path)?;

        let entry = match self.store.read(&record.file_name).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(file = %record.file_name, "index points at a missing entry");
                return None;
            }
            Err(e) => {
                warn!(file = %record.file_name, error = %e, "unreadable cache entry, treating as miss");
                return None;
            }
        };

        if entry.base_paths.gt != base.gt || entry.comparison_path != folder.path {
            warn!(file = %record.file_name, "cache entry belongs to different paths, treating as miss");
            return None;
        }
        if !entry.is_usable() {
            debug!(file = %record.file_name, "cache entry has no scores for its method");
            return None;
        }

        let stored = entry.method();
        let current = folder.method();
        // A reserved key cannot be relabelled; such a pair is recomputed.
        if stored != current && (stored.is_reserved() || current.is_reserved()) {
            debug!(file = %record.file_name, %stored, %current, "cached method role changed");
            return None;
        }

        match self.store.touch(&record.file_name, now).await {
            Ok(true) => {}
            Ok(false) => debug!(file = %record.file_name, "cache entry removed during lookup"),
            Err(e) => warn!(file = %record.file_name, error = %e, "failed to refresh cache entry access time"),
        }

        // Scores are keyed by (GT, folder) only; the other base folders may
        // have moved since the entry was written.
        let stored_base = entry.base_paths;
        let mut results = entry.results;
        for result in &mut results {
            if stored != current {
                result.rename_method(&stored, &current);
            }
            if stored_base.original != base.original {
                result.rebase_path(&MethodName::Original, &stored_base.original, &base.original);
            }
            if stored_base.mine != base.mine {
                result.rebase_path(&MethodName::Mine, &stored_base.mine, &base.mine);
            }
        }

        Some(CacheHit {
            folder: folder.clone(),
            file_name: record.file_name.clone(),
            results,
        })
    }

    /// Persist freshly computed results, one entry per computed folder.
    ///
    /// Each entry keeps only its folder's scores plus the `original`, `GT`
    /// and `mine` paths. The entry document is written before the index
    /// record; a crash in between leaves an orphan that `cleanup` sweeps.
    pub async fn commit(
        &self,
        base: &BaseFolderPaths,
        computed: &[ComparisonFolder],
        fresh: &[PerFileResult],
    ) -> CommitReport {
        let mut report = CommitReport::default();
        let now = Utc::now();

        for folder in computed {
            let method = folder.method();
            let projected: Vec<PerFileResult> = fresh.iter().filter_map(|r| r.project(&method)).collect();
            if projected.is_empty() {
                warn!(folder = %folder.name, "no fresh results for folder, nothing cached");
                report.skipped.push(folder.name.clone());
                continue;
            }

            let file_count = projected.len();
            let mut entry = CachedComparisonEntry::new(base, folder, projected, now);
            if let Ok(Some(previous)) = self.store.read(&entry.cache_key).await {
                if previous.comparison_path == folder.path && previous.base_paths.gt == base.gt {
                    entry.created_at = previous.created_at;
                }
            }

            if let Err(e) = self.store.write(&entry).await {
                warn!(folder = %folder.name, error = %e, "failed to write cache entry");
                report.failures.push(CommitFailure {
                    folder: folder.name.clone(),
                    error: e.to_string(),
                });
                continue;
            }

            let upserted = self
                .store
                .update_index(|index| index.upsert(&base.gt, &folder.path, &entry.cache_key, file_count, now))
                .await;
            match upserted {
                Ok(displaced) => {
                    for record in displaced.iter().filter(|r| r.file_name != entry.cache_key) {
                        if let Err(e) = self.store.delete(&record.file_name).await {
                            debug!(file = %record.file_name, error = %e, "failed to remove displaced entry");
                        }
                    }
                    debug!(folder = %folder.name, file = %entry.cache_key, files = file_count, "cached comparison");
                    report.written.push(folder.name.clone());
                }
                Err(e) => {
                    warn!(folder = %folder.name, error = %e, "failed to update GT index");
                    report.failures.push(CommitFailure {
                        folder: folder.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Whether a usable entry exists for `comparison` under `base.gt`.
    pub async fn has_cached(&self, base: &BaseFolderPaths, comparison: &Path) -> bool {
        let index = self.store.load_index().await;
        let Some(record) = index.lookup(&base.gt, comparison) else {
            return false;
        };
        matches!(
            self.store.read(&record.file_name).await,
            Ok(Some(entry)) if entry.comparison_path == comparison && entry.is_usable()
        )
    }

    /// Every readable entry cached against exactly `base`.
    ///
    /// Entries are found through `base.gt`, then kept only if their stored
    /// `original` and `mine` folders match as well.
    pub async fn cached_for(&self, base: &BaseFolderPaths) -> Vec<CachedComparisonEntry> {
        let index = self.store.load_index().await;
        let Some(gt_entry) = index.entry_for(&base.gt) else {
            return Vec::new();
        };
        let mut entries = Vec::new();
        for record in &gt_entry.comparisons {
            match self.store.read(&record.file_name).await {
                Ok(Some(entry)) if entry.base_paths == *base => entries.push(entry),
                Ok(_) => {}
                Err(e) => warn!(file = %record.file_name, error = %e, "skipping unreadable cache entry"),
            }
        }
        entries
    }

    /// Remove one cached comparison: index record first, then the document.
    pub async fn delete_entry(&self, file_name: &str) -> Result<bool, crate::cache::CacheError> {
        file_name.parse::<CacheKey>()?;
        let record = self.store.update_index(|index| index.remove(file_name)).await?;
        let deleted = self.store.delete(file_name).await?;
        Ok(record.is_some() || deleted)
    }
}
