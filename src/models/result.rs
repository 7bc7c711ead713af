//! Per-file metric results as produced by the metric backend.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::MethodName;

/// Scores keyed by method, in insertion order.
pub type ScoreMap = IndexMap<MethodName, f64>;

/// Every metric computed for one file name across the requested methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerFileResult {
    pub filename: String,
    #[serde(default)]
    pub iou_scores: ScoreMap,
    #[serde(default)]
    pub accuracy_scores: ScoreMap,
    #[serde(default)]
    pub dice_scores: ScoreMap,
    /// Image path per method, including the reserved `original`/`GT`/`mine`.
    #[serde(default)]
    pub paths: IndexMap<MethodName, PathBuf>,
}

impl PerFileResult {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            iou_scores: ScoreMap::new(),
            accuracy_scores: ScoreMap::new(),
            dice_scores: ScoreMap::new(),
            paths: IndexMap::new(),
        }
    }

    /// Whether any metric carries a score for `method`.
    pub fn has_scores_for(&self, method: &MethodName) -> bool {
        self.iou_scores.contains_key(method)
            || self.accuracy_scores.contains_key(method)
            || self.dice_scores.contains_key(method)
    }

    /// Move every value stored under `from` to `to`, dropping the old key.
    ///
    /// Reserved keys are never renamed, in either direction.
    pub fn rename_method(&mut self, from: &MethodName, to: &MethodName) {
        if from == to || from.is_reserved() || to.is_reserved() {
            return;
        }
        rename_key(&mut self.iou_scores, from, to);
        rename_key(&mut self.accuracy_scores, from, to);
        rename_key(&mut self.dice_scores, from, to);
        rename_key(&mut self.paths, from, to);
    }

    /// Restrict this result to a single method.
    ///
    /// Keeps the scores for `method` plus the paths of the reserved base
    /// methods, so the projection can be restored on its own. Returns `None`
    /// when no metric carries a score for `method`.
    pub fn project(&self, method: &MethodName) -> Option<PerFileResult> {
        if !self.has_scores_for(method) {
            return None;
        }

        let mut projected = PerFileResult::new(self.filename.clone());
        copy_key(&self.iou_scores, &mut projected.iou_scores, method);
        copy_key(&self.accuracy_scores, &mut projected.accuracy_scores, method);
        copy_key(&self.dice_scores, &mut projected.dice_scores, method);
        for key in [MethodName::Original, MethodName::Gt, MethodName::Mine] {
            copy_key(&self.paths, &mut projected.paths, &key);
        }
        copy_key(&self.paths, &mut projected.paths, method);
        Some(projected)
    }

    /// Move the image path stored under `method` from folder `from` to
    /// folder `to`, keeping its position relative to the folder.
    ///
    /// A path outside `from` is replaced by `to` joined with the file name.
    pub fn rebase_path(&mut self, method: &MethodName, from: &Path, to: &Path) {
        let Some(path) = self.paths.get_mut(method) else {
            return;
        };
        *path = match path.strip_prefix(from) {
            Ok(rest) => to.join(rest),
            Err(_) => to.join(&self.filename),
        };
    }

    /// Union `other` into `self`. On a key present in both, `other` wins.
    pub fn absorb(&mut self, other: &PerFileResult) {
        extend(&mut self.iou_scores, &other.iou_scores);
        extend(&mut self.accuracy_scores, &other.accuracy_scores);
        extend(&mut self.dice_scores, &other.dice_scores);
        extend(&mut self.paths, &other.paths);
    }
}

fn rename_key<V>(map: &mut IndexMap<MethodName, V>, from: &MethodName, to: &MethodName) {
    if let Some(value) = map.shift_remove(from) {
        map.insert(to.clone(), value);
    }
}

fn copy_key<V: Clone>(src: &IndexMap<MethodName, V>, dst: &mut IndexMap<MethodName, V>, key: &MethodName) {
    if let Some(value) = src.get(key) {
        dst.insert(key.clone(), value.clone());
    }
}

fn extend<V: Clone>(dst: &mut IndexMap<MethodName, V>, src: &IndexMap<MethodName, V>) {
    for (key, value) in src {
        dst.insert(key.clone(), value.clone());
    }
}
