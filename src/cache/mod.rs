//! Incremental comparison cache.
//!
//! Caches per-file GT comparison scores, one document per (GT folder,
//! comparison folder) pair, so that only folders without a usable entry are
//! sent to the metric backend.

pub mod entry;
pub mod eviction;
pub mod index;
pub mod key;
pub mod metadata;
pub mod store;

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::constants::VERSION;
use crate::coordinator::{CommitReport, IncrementalCacheCoordinator};
use crate::models::{BaseFolderPaths, ComparisonFolder, ComparisonRequest, PerFileResult};

pub use entry::CachedComparisonEntry;
pub use key::CacheKey;
pub use metadata::{CacheMetadata, MetadataService};
pub use store::{CacheStats, FileStore, human_size};

/// Errors from cache storage operations.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to {operation} {}: {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("corrupt cache document {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{0}` is not a cache entry file name")]
    InvalidKey(String),

    #[error("caching is disabled")]
    Disabled,
}

/// Build a `map_err` adapter that attaches the operation and path.
pub(crate) fn io_error(operation: &'static str, path: &Path) -> impl FnOnce(io::Error) -> CacheError {
    let path = path.to_path_buf();
    move |source| CacheError::Io {
        operation,
        path,
        source,
    }
}

/// Read a whole file. A missing file is `Ok(None)`.
pub(crate) async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, CacheError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error("read", path)(e)),
    }
}

/// Replace `path` with `content`: write a sibling temp file, then rename it
/// over the target. Readers never observe a partially written document.
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> Result<(), CacheError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(io_error("create_dir", parent))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = parent.join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    tokio::fs::write(&tmp_path, content)
        .await
        .map_err(io_error("write", &tmp_path))?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(io_error("rename", path)(e));
    }
    Ok(())
}

/// Result of the startup version check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    /// Caching is off; nothing was checked.
    Disabled,
    /// The cache was written by the running version.
    Current,
    /// The cache was written by another version (or nothing vouched for
    /// it) and has been cleared.
    Invalidated {
        previous: Option<String>,
        removed: usize,
    },
}

/// Cached part of a request plus what remains to be computed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncrementalLoad {
    /// Merged cached results, one record per file name.
    pub cached_results: Vec<PerFileResult>,
    /// Folders with no usable entry, `mine` first when it is missing.
    pub missing_comparisons: Vec<ComparisonFolder>,
    /// Folders served from the cache.
    pub cached: Vec<ComparisonFolder>,
}

impl IncrementalLoad {
    /// Nothing is cached; every target must be computed.
    fn all_missing(request: &ComparisonRequest) -> Self {
        Self {
            cached_results: Vec::new(),
            missing_comparisons: request.cache_targets(),
            cached: Vec::new(),
        }
    }
}

/// The comparison cache, or a no-op when caching is disabled.
#[derive(Debug)]
pub struct CacheEngine {
    store: Option<FileStore>,
    version: String,
}

impl CacheEngine {
    /// Open a cache rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        Ok(Self {
            store: Some(FileStore::open(dir).await?),
            version: VERSION.to_string(),
        })
    }

    /// An engine that caches nothing.
    pub fn disabled() -> Self {
        Self {
            store: None,
            version: VERSION.to_string(),
        }
    }

    /// Build the engine described by `[cache]`.
    pub async fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        match config.resolved_dir() {
            Some(dir) => Self::open(dir).await,
            None => {
                warn!("no data directory available, caching disabled");
                Ok(Self::disabled())
            }
        }
    }

    /// Override the version used for the startup check.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Return the cache directory path.
    pub fn path(&self) -> Option<&Path> {
        self.store.as_ref().map(FileStore::dir)
    }

    fn store(&self) -> Result<&FileStore, CacheError> {
        self.store.as_ref().ok_or(CacheError::Disabled)
    }

    fn metadata_service<'a>(&'a self, store: &'a FileStore) -> MetadataService<'a> {
        MetadataService::new(store, &self.version)
    }

    /// Clear the cache if it was written by a different version, then
    /// stamp the running one. Must run before the first read.
    pub async fn initialize(&self) -> Result<VersionCheck, CacheError> {
        let Some(store) = &self.store else {
            return Ok(VersionCheck::Disabled);
        };
        let service = self.metadata_service(store);
        if service.check_version(&self.version).await {
            debug!(version = %self.version, "cache version is current");
            return Ok(VersionCheck::Current);
        }

        let previous = service.load().await.map(|m| m.version);
        let removed = eviction::clear_all(store).await?;
        service.stamp_version(&self.version).await?;
        info!(
            previous = previous.as_deref().unwrap_or("unknown"),
            current = %self.version,
            removed,
            "cache version changed, cleared cache"
        );
        Ok(VersionCheck::Invalidated { previous, removed })
    }

    /// A coordinator over this engine's store, if caching is enabled.
    pub fn coordinator(&self) -> Option<IncrementalCacheCoordinator<'_>> {
        self.store.as_ref().map(IncrementalCacheCoordinator::new)
    }

    /// Split a request into cached results and folders still to compute.
    ///
    /// The `mine` folder is classified alongside the comparisons. With
    /// caching disabled everything is missing.
    pub async fn load_incremental(&self, request: &ComparisonRequest) -> IncrementalLoad {
        let Some(coordinator) = self.coordinator() else {
            return IncrementalLoad::all_missing(request);
        };
        let classification = coordinator.classify(&request.base, &request.cache_targets()).await;
        IncrementalLoad {
            cached_results: classification.merged(),
            missing_comparisons: classification.misses,
            cached: classification.hits.into_iter().map(|h| h.folder).collect(),
        }
    }

    /// Persist freshly computed results for `folders` and refresh metadata.
    ///
    /// Never fails; problems are reported in the returned [`CommitReport`].
    pub async fn save_results(
        &self,
        base: &BaseFolderPaths,
        folders: &[ComparisonFolder],
        results: &[PerFileResult],
    ) -> CommitReport {
        let Some(store) = &self.store else {
            return CommitReport::default();
        };
        let report = IncrementalCacheCoordinator::new(store)
            .commit(base, folders, results)
            .await;
        if !report.written.is_empty() {
            if let Err(e) = self.metadata_service(store).recompute().await {
                warn!(error = %e, "failed to refresh cache metadata");
            }
        }
        report
    }

    /// Remove every cached comparison. Returns the number removed.
    pub async fn clear_all(&self) -> Result<usize, CacheError> {
        let store = self.store()?;
        let removed = eviction::clear_all(store).await?;
        self.metadata_service(store).recompute().await?;
        Ok(removed)
    }

    /// Remove comparisons not accessed within `max_age_days`.
    pub async fn cleanup(&self, max_age_days: u32) -> Result<usize, CacheError> {
        let store = self.store()?;
        let now = Utc::now();
        let removed = eviction::cleanup(store, max_age_days, now).await?;
        self.metadata_service(store).mark_cleanup(now).await?;
        Ok(removed)
    }

    /// Persisted metadata, if any.
    pub async fn metadata(&self) -> Option<CacheMetadata> {
        let store = self.store.as_ref()?;
        self.metadata_service(store).load().await
    }

    /// Every readable entry, most recently accessed first.
    pub async fn list_all_entries(&self) -> Result<Vec<CachedComparisonEntry>, CacheError> {
        self.store()?.list_all().await
    }

    /// Remove one cached comparison by file name.
    pub async fn delete_entry(&self, file_name: &str) -> Result<bool, CacheError> {
        let store = self.store()?;
        let deleted = IncrementalCacheCoordinator::new(store).delete_entry(file_name).await?;
        if deleted {
            self.metadata_service(store).recompute().await?;
        }
        Ok(deleted)
    }

    /// Entries cached against exactly `base` (same GT, original and mine).
    pub async fn cached_for(&self, base: &BaseFolderPaths) -> Vec<CachedComparisonEntry> {
        match self.coordinator() {
            Some(coordinator) => coordinator.cached_for(base).await,
            None => Vec::new(),
        }
    }

    /// Whether a usable entry exists for `comparison` under `base.gt`.
    pub async fn has_cached(&self, base: &BaseFolderPaths, comparison: &Path) -> bool {
        match self.coordinator() {
            Some(coordinator) => coordinator.has_cached(base, comparison).await,
            None => false,
        }
    }

    /// Compute statistics about the cache.
    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        self.store()?.stats().await
    }
}
