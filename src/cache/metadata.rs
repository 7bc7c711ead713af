//! Aggregate cache statistics, cleanup timestamp and version tag.
//!
//! The metadata document is derived data. It is rebuilt from a store scan
//! after every write, clear or cleanup, and only its `version` field is
//! ever acted upon.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::store::{FileStore, human_size};
use super::{CacheError, read_optional, write_atomic};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    /// Bytes used by entry documents.
    pub total_size: u64,
    /// Number of entry documents.
    pub count: usize,
    pub last_cleanup: DateTime<Utc>,
    /// Application version that wrote the cache.
    #[serde(default)]
    pub version: String,
}

impl CacheMetadata {
    /// Metadata for an empty cache written by `version`.
    pub fn empty(version: &str) -> Self {
        Self {
            total_size: 0,
            count: 0,
            last_cleanup: Utc::now(),
            version: version.to_string(),
        }
    }

    pub fn human_size(&self) -> String {
        human_size(self.total_size)
    }
}

/// Reads and maintains `metadata.json` for one store.
pub struct MetadataService<'a> {
    store: &'a FileStore,
    /// Version of the running application, stamped when none is recorded.
    version: &'a str,
}

impl<'a> MetadataService<'a> {
    pub fn new(store: &'a FileStore, version: &'a str) -> Self {
        Self { store, version }
    }

    /// The persisted document, if present and readable.
    pub async fn load(&self) -> Option<CacheMetadata> {
        let path = self.store.metadata_path();
        match read_optional(&path).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt cache metadata");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "failed to read cache metadata");
                None
            }
        }
    }

    /// Rescan the store and persist fresh totals, keeping the recorded
    /// cleanup time and version.
    pub async fn recompute(&self) -> Result<CacheMetadata, CacheError> {
        let stats = self.store.stats().await?;
        let previous = self.load().await;
        let metadata = CacheMetadata {
            total_size: stats.total_bytes,
            count: stats.entries,
            last_cleanup: previous
                .as_ref()
                .map_or_else(Utc::now, |m| m.last_cleanup),
            version: previous
                .map(|m| m.version)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| self.version.to_string()),
        };
        self.save(&metadata).await?;
        Ok(metadata)
    }

    /// Record a cleanup pass at `now` and refresh the totals.
    pub async fn mark_cleanup(&self, now: DateTime<Utc>) -> Result<CacheMetadata, CacheError> {
        let mut metadata = self.recompute().await?;
        metadata.last_cleanup = now;
        self.save(&metadata).await?;
        Ok(metadata)
    }

    /// Whether the cache was written by `current`.
    ///
    /// A missing or unreadable document counts as a mismatch: nothing
    /// vouches for the format of whatever is on disk.
    pub async fn check_version(&self, current: &str) -> bool {
        self.load().await.is_some_and(|m| m.version == current)
    }

    /// Record `version` as the writer of the cache.
    pub async fn stamp_version(&self, version: &str) -> Result<CacheMetadata, CacheError> {
        let mut metadata = self.recompute().await?;
        metadata.version = version.to_string();
        self.save(&metadata).await?;
        Ok(metadata)
    }

    async fn save(&self, metadata: &CacheMetadata) -> Result<(), CacheError> {
        let content = serde_json::to_vec_pretty(metadata).map_err(|e| CacheError::Serialize {
            what: "cache metadata",
            source: e,
        })?;
        write_atomic(&self.store.metadata_path(), &content).await
    }
}
