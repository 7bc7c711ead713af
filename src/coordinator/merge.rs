//! Union of per-file results from independent cache entries.
//!
//! Each cache entry carries scores for a single method, so the results of a
//! multi-folder request arrive as several lists that mention the same file
//! names. They are folded into one record per file name.

use std::collections::BTreeMap;

use crate::models::PerFileResult;

/// Merge result groups into one record per file name, sorted by file name.
///
/// Score and path maps are unioned. When two groups carry a value for the
/// same method, the later group wins. Distinct methods never collide, so the
/// outcome does not depend on group order, and merging a group twice is the
/// same as merging it once.
pub fn merge<G>(groups: &[G]) -> Vec<PerFileResult>
where
    G: AsRef<[PerFileResult]>,
{
    let mut by_file: BTreeMap<&str, PerFileResult> = BTreeMap::new();
    for group in groups {
        for result in group.as_ref() {
            match by_file.get_mut(result.filename.as_str()) {
                Some(existing) => existing.absorb(result),
                None => {
                    by_file.insert(result.filename.as_str(), result.clone());
                }
            }
        }
    }
    by_file.into_values().collect()
}
