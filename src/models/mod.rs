//! Shared types used across all modules.
//!
//! Defines the request-side data model (base folders, comparison folders,
//! per-file results). The cache and coordinator modules import from here
//! rather than reaching into each other's internals.

pub mod method;
pub mod result;

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use method::MethodName;
pub use result::{PerFileResult, ScoreMap};

/// Errors raised while validating a comparison request.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RequestError {
    #[error("comparison folder at {0} has an empty name")]
    EmptyName(PathBuf),

    #[error("comparison name `{0}` is reserved")]
    ReservedName(String),

    #[error("comparison name `{0}` is used more than once")]
    DuplicateName(String),

    #[error("folder {} is compared more than once", .0.display())]
    DuplicatePath(PathBuf),
}

/// The invariant folders of one comparison session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaseFolderPaths {
    pub original: PathBuf,
    pub gt: PathBuf,
    pub mine: PathBuf,
}

impl BaseFolderPaths {
    /// The user's own result set, scored against GT like any comparison.
    pub fn mine_folder(&self) -> ComparisonFolder {
        ComparisonFolder {
            id: ComparisonFolder::MINE_ID.to_string(),
            name: MethodName::MINE.to_string(),
            path: self.mine.clone(),
        }
    }
}

/// A user-labelled result folder.
///
/// `id` and `path` are stable; `name` may be changed by the user at any time
/// and is the method key its scores are reported under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComparisonFolder {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
}

impl ComparisonFolder {
    /// Id reserved for the folder built by [`BaseFolderPaths::mine_folder`].
    pub const MINE_ID: &'static str = "mine";

    /// Create a folder with a fresh random id.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn is_mine(&self) -> bool {
        self.id == Self::MINE_ID
    }

    /// The key this folder's scores are reported under.
    ///
    /// Parsed the same way stored keys are read back, so a reserved
    /// spelling maps to its reserved key.
    pub fn method(&self) -> MethodName {
        if self.is_mine() {
            MethodName::Mine
        } else {
            MethodName::from(self.name.as_str())
        }
    }
}

/// A complete comparison request as submitted by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRequest {
    pub base: BaseFolderPaths,
    pub comparisons: Vec<ComparisonFolder>,
    /// File names present in every folder, supplied by the folder validator.
    #[serde(default)]
    pub common_files: Vec<String>,
}

impl ComparisonRequest {
    /// Reject names that would collide with reserved or sibling method keys,
    /// and folders that share a path (and so a cache key) with `mine` or a
    /// sibling.
    pub fn validate(&self) -> Result<(), RequestError> {
        let mut seen = HashSet::new();
        let mut paths = HashSet::from([self.base.mine.as_path()]);
        for folder in &self.comparisons {
            let name = folder.name.trim();
            if name.is_empty() {
                return Err(RequestError::EmptyName(folder.path.clone()));
            }
            if MethodName::is_reserved_name(name) || folder.is_mine() {
                return Err(RequestError::ReservedName(folder.name.clone()));
            }
            if !seen.insert(name) {
                return Err(RequestError::DuplicateName(folder.name.clone()));
            }
            if !paths.insert(folder.path.as_path()) {
                return Err(RequestError::DuplicatePath(folder.path.clone()));
            }
        }
        Ok(())
    }

    /// Every folder that is cached against GT: the mine folder first, then
    /// the comparisons in request order.
    pub fn cache_targets(&self) -> Vec<ComparisonFolder> {
        let mut targets = Vec::with_capacity(self.comparisons.len() + 1);
        targets.push(self.base.mine_folder());
        targets.extend(self.comparisons.iter().cloned());
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(names: &[&str]) -> ComparisonRequest {
        ComparisonRequest {
            base: BaseFolderPaths {
                original: "/d/orig".into(),
                gt: "/d/gt".into(),
                mine: "/d/mine".into(),
            },
            comparisons: names
                .iter()
                .map(|n| ComparisonFolder::new(*n, format!("/d/{n}")))
                .collect(),
            common_files: vec![],
        }
    }

    #[test]
    fn validate_accepts_distinct_names() {
        assert!(request(&["A", "B"]).validate().is_ok());
    }

    #[test]
    fn validate_rejects_reserved_names() {
        assert_eq!(
            request(&["GT"]).validate(),
            Err(RequestError::ReservedName("GT".into()))
        );
        assert!(request(&["mine"]).validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicates_and_blanks() {
        assert_eq!(
            request(&["A", "A"]).validate(),
            Err(RequestError::DuplicateName("A".into()))
        );
        assert!(matches!(
            request(&[" "]).validate(),
            Err(RequestError::EmptyName(_))
        ));
    }

    #[test]
    fn validate_rejects_shared_paths() {
        let mut req = request(&["A", "B"]);
        req.comparisons[1].path = req.comparisons[0].path.clone();
        assert_eq!(
            req.validate(),
            Err(RequestError::DuplicatePath("/d/A".into()))
        );

        let mut req = request(&["A"]);
        req.comparisons[0].path = req.base.mine.clone();
        assert_eq!(
            req.validate(),
            Err(RequestError::DuplicatePath("/d/mine".into()))
        );
    }

    #[test]
    fn method_agrees_with_stored_key_parsing() {
        let folder = ComparisonFolder::new("GT", "/d/x");
        assert_eq!(folder.method(), MethodName::Gt);
        let json = serde_json::to_string(&folder.method()).unwrap();
        assert_eq!(serde_json::from_str::<MethodName>(&json).unwrap(), folder.method());
        assert_eq!(ComparisonFolder::new("A", "/d/a").method(), MethodName::comparison("A"));
    }

    #[test]
    fn cache_targets_put_mine_first() {
        let targets = request(&["A"]).cache_targets();
        assert_eq!(targets.len(), 2);
        assert!(targets[0].is_mine());
        assert_eq!(targets[0].method(), MethodName::Mine);
        assert_eq!(targets[0].path, PathBuf::from("/d/mine"));
        assert_eq!(targets[1].method(), MethodName::comparison("A"));
    }

    #[test]
    fn new_folders_get_unique_ids() {
        let a = ComparisonFolder::new("A", "/a");
        let b = ComparisonFolder::new("A", "/a");
        assert_ne!(a.id, b.id);
    }
}
