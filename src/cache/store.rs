//! Filesystem-based cache store.
//!
//! Stores one JSON document per cached comparison next to the GT index and
//! the metadata document, all in a single cache directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::entry::CachedComparisonEntry;
use super::index::GtIndex;
use super::key::CacheKey;
use super::{CacheError, io_error, read_optional, write_atomic};
use crate::constants::{GT_INDEX_FILE, METADATA_FILE};

/// Filesystem-based cache store.
///
/// Every read-modify-write of the GT index goes through [`FileStore::update_index`],
/// which holds an async mutex for the duration, so concurrent requests
/// sharing one store cannot drop each other's index updates. Entry writes,
/// touches and deletes share a second lock so an access-time refresh never
/// writes back a document that another request has replaced or removed.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    index_lock: Mutex<()>,
    entry_lock: Mutex<()>,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            index_lock: Mutex::new(()),
            entry_lock: Mutex::new(()),
        }
    }

    /// Create a store and make sure its directory exists.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let store = Self::new(dir);
        tokio::fs::create_dir_all(&store.dir)
            .await
            .map_err(io_error("create_dir", &store.dir))?;
        Ok(store)
    }

    /// Return the cache directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(GT_INDEX_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Resolve an entry file name, rejecting anything that is not a cache key.
    fn entry_path(&self, file_name: &str) -> Result<PathBuf, CacheError> {
        file_name.parse::<CacheKey>()?;
        Ok(self.dir.join(file_name))
    }

    /// Read an entry. A missing document is `Ok(None)`.
    pub async fn read(&self, file_name: &str) -> Result<Option<CachedComparisonEntry>, CacheError> {
        let path = self.entry_path(file_name)?;
        let Some(bytes) = read_optional(&path).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CacheError::Corrupt { path, source: e })
    }

    /// Persist an entry under its `cache_key`. Returns the document size.
    pub async fn write(&self, entry: &CachedComparisonEntry) -> Result<u64, CacheError> {
        let _guard = self.entry_lock.lock().await;
        self.write_unlocked(entry).await
    }

    async fn write_unlocked(&self, entry: &CachedComparisonEntry) -> Result<u64, CacheError> {
        let path = self.entry_path(&entry.cache_key)?;
        let content = serde_json::to_vec_pretty(entry).map_err(|e| CacheError::Serialize {
            what: "cache entry",
            source: e,
        })?;
        write_atomic(&path, &content).await?;
        debug!(file = %entry.cache_key, bytes = content.len(), "cache entry written");
        Ok(content.len() as u64)
    }

    /// Refresh the stored entry's access time.
    ///
    /// The document is re-read under the entry lock and only its timestamp
    /// changes. Returns `false` if the entry no longer exists.
    pub async fn touch(&self, file_name: &str, now: DateTime<Utc>) -> Result<bool, CacheError> {
        let _guard = self.entry_lock.lock().await;
        let Some(mut entry) = self.read(file_name).await? else {
            return Ok(false);
        };
        entry.last_accessed_at = now;
        self.write_unlocked(&entry).await?;
        Ok(true)
    }

    /// Remove an entry. Returns `false` if it did not exist.
    pub async fn delete(&self, file_name: &str) -> Result<bool, CacheError> {
        let path = self.entry_path(file_name)?;
        let _guard = self.entry_lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("remove", &path)(e)),
        }
    }

    /// Names of every entry document in the directory, sorted.
    pub async fn file_names(&self) -> Result<Vec<String>, CacheError> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// Every readable entry, most recently accessed first.
    ///
    /// Corrupt documents are skipped with a warning.
    pub async fn list_all(&self) -> Result<Vec<CachedComparisonEntry>, CacheError> {
        let mut entries = Vec::new();
        for name in self.file_names().await? {
            match self.read(&name).await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => warn!(file = %name, error = %e, "skipping unreadable cache entry"),
            }
        }
        entries.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        Ok(entries)
    }

    /// Compute statistics about the stored entries.
    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let files = self.scan().await?;
        Ok(CacheStats {
            entries: files.len(),
            total_bytes: files.iter().map(|(_, size)| size).sum(),
        })
    }

    /// Load the GT index without taking the lock. Soft: never fails.
    pub async fn load_index(&self) -> GtIndex {
        GtIndex::load(&self.index_path()).await
    }

    /// Load, mutate and save the GT index under the index lock.
    pub async fn update_index<T>(&self, mutate: impl FnOnce(&mut GtIndex) -> T) -> Result<T, CacheError> {
        let _guard = self.index_lock.lock().await;
        let path = self.index_path();
        let mut index = GtIndex::load(&path).await;
        let out = mutate(&mut index);
        index.save(&path).await?;
        Ok(out)
    }

    /// `(file name, size)` of every entry document.
    async fn scan(&self) -> Result<Vec<(String, u64)>, CacheError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("read_dir", &self.dir)(e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(io_error("read_dir_entry", &self.dir))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.parse::<CacheKey>().is_err() {
                continue;
            }
            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            files.push((name, size));
        }
        files.sort();
        Ok(files)
    }
}

/// Statistics about the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached entries.
    pub entries: usize,
    /// Total size in bytes.
    pub total_bytes: u64,
}

impl CacheStats {
    /// Format total_bytes as a human-readable string.
    pub fn human_size(&self) -> String {
        human_size(self.total_bytes)
    }
}

/// Format a byte count as B/KiB/MiB/GiB.
pub fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GiB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MiB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KiB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
