//! Age-based eviction and full invalidation.
//!
//! Nothing here runs on a timer; both passes are triggered by an explicit
//! user action or by a version mismatch at startup.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::CacheError;
use super::store::FileStore;

/// Remove every comparison whose last access is at or before
/// `now - max_age_days`.
///
/// Records are dropped from the GT index (and emptied GT entries with them)
/// before their documents are deleted. Orphan documents that no index
/// record points at are swept by their own `lastAccessedAt`; corrupt ones
/// are left in place for inspection. Returns the number of comparisons
/// removed.
pub async fn cleanup(store: &FileStore, max_age_days: u32, now: DateTime<Utc>) -> Result<usize, CacheError> {
    let cutoff = now - Duration::days(i64::from(max_age_days));

    let stale = store
        .update_index(|index| index.drain_where(|record| record.last_accessed <= cutoff))
        .await?;

    let mut removed = stale.len();
    for record in &stale {
        if let Err(e) = store.delete(&record.file_name).await {
            warn!(file = %record.file_name, error = %e, "failed to delete evicted cache entry");
        }
    }

    let referenced: HashSet<String> = store
        .load_index()
        .await
        .records()
        .map(|r| r.file_name.clone())
        .collect();
    for name in store.file_names().await? {
        if referenced.contains(&name) {
            continue;
        }
        match store.read(&name).await {
            Ok(Some(entry)) if entry.last_accessed_at <= cutoff => {
                if store.delete(&name).await? {
                    debug!(file = %name, "removed orphan cache entry");
                    removed += 1;
                }
            }
            Ok(_) => {}
            Err(e) => debug!(file = %name, error = %e, "leaving unreadable orphan in place"),
        }
    }

    info!(removed, max_age_days, "cache cleanup finished");
    Ok(removed)
}

/// Delete every entry document and reset the GT index to empty.
///
/// Returns the number of documents deleted.
pub async fn clear_all(store: &FileStore) -> Result<usize, CacheError> {
    let names = store.file_names().await?;
    let mut removed = 0;
    for name in &names {
        match store.delete(name).await {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => warn!(file = %name, error = %e, "failed to delete cache entry"),
        }
    }
    store.update_index(|index| *index = Default::default()).await?;
    info!(removed, "cache cleared");
    Ok(removed)
}
