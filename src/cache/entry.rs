//! The persisted per-comparison cache document.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::CacheKey;
use crate::models::{BaseFolderPaths, ComparisonFolder, MethodName, PerFileResult};

/// Every per-file score for one comparison folder measured against one GT folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedComparisonEntry {
    /// Entry file name, `<gtHash>_<comparisonHash>.json`.
    pub cache_key: String,
    /// Base folders of the request that produced the entry. Only `gt` takes
    /// part in lookups.
    pub base_paths: BaseFolderPaths,
    /// Folder name at the time the entry was written.
    pub comparison_name: String,
    pub comparison_path: PathBuf,
    pub results: Vec<PerFileResult>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl CachedComparisonEntry {
    pub fn new(
        base_paths: &BaseFolderPaths,
        folder: &ComparisonFolder,
        results: Vec<PerFileResult>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            cache_key: CacheKey::derive(&base_paths.gt, &folder.path).file_name(),
            base_paths: base_paths.clone(),
            comparison_name: folder.method().as_str().to_string(),
            comparison_path: folder.path.clone(),
            results,
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// The key the stored scores are filed under.
    pub fn method(&self) -> MethodName {
        MethodName::from(self.comparison_name.as_str())
    }

    /// Whether at least one file carries a score for the stored method.
    pub fn is_usable(&self) -> bool {
        let method = self.method();
        self.results.iter().any(|r| r.has_scores_for(&method))
    }
}
