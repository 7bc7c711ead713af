//! MetricBackend trait: the seam to whatever computes IoU/accuracy/Dice.
//!
//! The cache never computes scores itself. Folders that miss the cache are
//! handed to a backend as one [`ComputeJob`].

pub mod command;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{BaseFolderPaths, ComparisonFolder, PerFileResult};

pub use command::CommandBackend;

/// Errors from a metric backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to start backend `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("backend timed out after {0}s")]
    Timeout(u64),

    #[error("backend exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("failed to parse backend output: {0}")]
    Parse(String),

    #[error("backend not configured: {0}")]
    NotConfigured(String),
}

/// One folder to score against GT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFolder {
    pub name: String,
    pub path: PathBuf,
}

impl From<&ComparisonFolder> for JobFolder {
    fn from(folder: &ComparisonFolder) -> Self {
        Self {
            name: folder.name.clone(),
            path: folder.path.clone(),
        }
    }
}

/// Input of one backend invocation.
///
/// `mine` is always scored by the backend; `comparisons` lists the extra
/// folders to score in the same pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeJob {
    pub original: PathBuf,
    pub gt: PathBuf,
    pub mine: PathBuf,
    pub comparisons: Vec<JobFolder>,
    pub common_files: Vec<String>,
}

impl ComputeJob {
    pub fn new(base: &BaseFolderPaths, comparisons: &[ComparisonFolder], common_files: &[String]) -> Self {
        Self {
            original: base.original.clone(),
            gt: base.gt.clone(),
            mine: base.mine.clone(),
            comparisons: comparisons.iter().map(JobFolder::from).collect(),
            common_files: common_files.to_vec(),
        }
    }
}

/// Computes per-file scores for a job.
#[async_trait]
pub trait MetricBackend: Send + Sync {
    /// Score `mine` and every comparison folder of `job` against GT.
    async fn compute(&self, job: &ComputeJob) -> Result<Vec<PerFileResult>, BackendError>;
}
