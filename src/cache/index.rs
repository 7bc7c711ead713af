//! The GT index: which comparison folders are cached against which GT folder.
//!
//! The index is the single source of truth for "does a cache entry exist".
//! It is persisted as one JSON document and always written whole.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::key::{CacheKey, hash_path};
use super::{CacheError, read_optional, write_atomic};

/// One comparison folder cached against a GT folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRecord {
    pub comparison_path: PathBuf,
    pub comparison_hash: String,
    /// Entry document in the store.
    pub file_name: String,
    pub last_accessed: DateTime<Utc>,
    /// Number of per-file results in the entry.
    pub file_count: usize,
}

/// Everything cached against one GT folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GtIndexEntry {
    pub gt_path: PathBuf,
    pub gt_hash: String,
    pub comparisons: Vec<ComparisonRecord>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// GT hash → [`GtIndexEntry`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GtIndex {
    entries: BTreeMap<String, GtIndexEntry>,
}

impl GtIndex {
    /// Read the index document.
    ///
    /// A missing document is an empty index. An unreadable or unparseable
    /// one is logged and also treated as empty: a broken index means a cold
    /// cache, never a failure.
    pub async fn load(path: &Path) -> Self {
        match read_optional(path).await {
            Ok(None) => Self::default(),
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(index) => index,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt GT index, treating as empty");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to read GT index, treating as empty");
                Self::default()
            }
        }
    }

    /// Replace the index document.
    pub async fn save(&self, path: &Path) -> Result<(), CacheError> {
        let content = serde_json::to_vec_pretty(self).map_err(|e| CacheError::Serialize {
            what: "GT index",
            source: e,
        })?;
        write_atomic(path, &content).await
    }

    /// Find the record for a (GT, comparison) pair.
    ///
    /// Both plaintext paths must match exactly; a hash match alone is a miss.
    pub fn lookup(&self, gt: &Path, comparison: &Path) -> Option<&ComparisonRecord> {
        let entry = self.entries.get(&hash_path(gt))?;
        if entry.gt_path != gt {
            return None;
        }
        entry
            .comparisons
            .iter()
            .find(|c| c.comparison_path == comparison)
    }

    /// Create or refresh the record for a (GT, comparison) pair.
    ///
    /// Returns records displaced by a hash collision: those of a different
    /// GT path filed under the same GT hash, or a different comparison path
    /// that resolved to the same file name. Their documents are no longer
    /// reachable through the index.
    pub fn upsert(
        &mut self,
        gt: &Path,
        comparison: &Path,
        file_name: &str,
        file_count: usize,
        now: DateTime<Utc>,
    ) -> Vec<ComparisonRecord> {
        let gt_hash = hash_path(gt);
        let mut displaced = Vec::new();

        if let Some(existing) = self.entries.get(&gt_hash) {
            if existing.gt_path != gt {
                if let Some(old) = self.entries.remove(&gt_hash) {
                    displaced.extend(old.comparisons);
                }
            }
        }

        let entry = self
            .entries
            .entry(gt_hash.clone())
            .or_insert_with(|| GtIndexEntry {
                gt_path: gt.to_path_buf(),
                gt_hash,
                comparisons: Vec::new(),
                created_at: now,
                last_accessed: now,
            });

        let (same_file, others): (Vec<_>, Vec<_>) = std::mem::take(&mut entry.comparisons)
            .into_iter()
            .partition(|c| c.file_name == file_name && c.comparison_path != comparison);
        entry.comparisons = others;
        displaced.extend(same_file);

        match entry
            .comparisons
            .iter_mut()
            .find(|c| c.comparison_path == comparison)
        {
            Some(record) => {
                record.file_name = file_name.to_string();
                record.last_accessed = now;
                record.file_count = file_count;
            }
            None => entry.comparisons.push(ComparisonRecord {
                comparison_path: comparison.to_path_buf(),
                comparison_hash: hash_path(comparison),
                file_name: file_name.to_string(),
                last_accessed: now,
                file_count,
            }),
        }
        entry.last_accessed = now;

        displaced
    }

    /// Bump the access time of a record and its GT entry.
    pub fn touch(&mut self, gt: &Path, comparison: &Path, now: DateTime<Utc>) -> bool {
        let Some(entry) = self.entries.get_mut(&hash_path(gt)) else {
            return false;
        };
        if entry.gt_path != gt {
            return false;
        }
        let Some(record) = entry
            .comparisons
            .iter_mut()
            .find(|c| c.comparison_path == comparison)
        else {
            return false;
        };
        record.last_accessed = now;
        entry.last_accessed = now;
        true
    }

    /// Remove the record pointing at `file_name`, dropping its GT entry if
    /// that leaves it empty.
    pub fn remove(&mut self, file_name: &str) -> Option<ComparisonRecord> {
        // The GT half of a well-formed file name is the index key.
        let hint = file_name
            .parse::<CacheKey>()
            .ok()
            .map(|key| key.gt_hash)
            .filter(|hash| self.entries.contains_key(hash));
        let gt_hash = hint.or_else(|| {
            self.entries
                .iter()
                .find(|(_, e)| e.comparisons.iter().any(|c| c.file_name == file_name))
                .map(|(hash, _)| hash.clone())
        })?;

        let entry = self.entries.get_mut(&gt_hash)?;
        let position = entry
            .comparisons
            .iter()
            .position(|c| c.file_name == file_name)?;
        let removed = entry.comparisons.remove(position);
        if entry.comparisons.is_empty() {
            self.entries.remove(&gt_hash);
        }
        Some(removed)
    }

    /// Drop every record matching `stale`, and every GT entry left empty.
    /// Returns the dropped records.
    pub fn drain_where(&mut self, mut stale: impl FnMut(&ComparisonRecord) -> bool) -> Vec<ComparisonRecord> {
        let mut drained = Vec::new();
        for entry in self.entries.values_mut() {
            let (gone, kept): (Vec<_>, Vec<_>) =
                std::mem::take(&mut entry.comparisons).into_iter().partition(|c| stale(c));
            entry.comparisons = kept;
            drained.extend(gone);
        }
        self.entries.retain(|_, e| !e.comparisons.is_empty());
        drained
    }

    /// The entry for a GT folder, if its plaintext path matches.
    pub fn entry_for(&self, gt: &Path) -> Option<&GtIndexEntry> {
        self.entries.get(&hash_path(gt)).filter(|e| e.gt_path == gt)
    }

    pub fn entries(&self) -> impl Iterator<Item = &GtIndexEntry> {
        self.entries.values()
    }

    /// Every comparison record across all GT entries.
    pub fn records(&self) -> impl Iterator<Item = &ComparisonRecord> {
        self.entries.values().flat_map(|e| e.comparisons.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
