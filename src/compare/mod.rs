//! Comparison runner: cache lookup, backend compute for misses, write-back.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{BackendError, ComputeJob, MetricBackend};
use crate::cache::CacheEngine;
use crate::coordinator::merge;
use crate::models::{ComparisonRequest, PerFileResult, RequestError};

/// Errors from a comparison run.
#[derive(Error, Debug)]
pub enum CompareError {
    #[error("invalid request: {0}")]
    Request(#[from] RequestError),

    #[error("metric backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Result of a comparison run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonOutcome {
    /// One record per file name carrying every requested method.
    pub results: Vec<PerFileResult>,
    /// Names of folders served from the cache.
    pub cached: Vec<String>,
    /// Names of folders sent to the backend.
    pub computed: Vec<String>,
    /// Non-fatal cache write problems.
    pub warnings: Vec<String>,
}

/// Runs comparison requests through the cache and a metric backend.
pub struct ComparisonRunner {
    engine: Arc<CacheEngine>,
    backend: Arc<dyn MetricBackend>,
}

impl ComparisonRunner {
    pub fn new(engine: Arc<CacheEngine>, backend: Arc<dyn MetricBackend>) -> Self {
        Self { engine, backend }
    }

    /// Serve what the cache has, compute the rest, persist it, and return
    /// the merged results.
    ///
    /// The backend is called at most once, and not at all when every folder
    /// (including `mine`) is cached.
    pub async fn run(&self, request: &ComparisonRequest) -> Result<ComparisonOutcome, CompareError> {
        request.validate()?;

        let load = self.engine.load_incremental(request).await;
        let cached: Vec<String> = load.cached.iter().map(|f| f.name.clone()).collect();

        if load.missing_comparisons.is_empty() {
            info!(cached = cached.len(), "all comparisons served from cache");
            return Ok(ComparisonOutcome {
                results: load.cached_results,
                cached,
                computed: Vec::new(),
                warnings: Vec::new(),
            });
        }

        // `mine` is part of every job, so only real comparisons are listed.
        let to_compute: Vec<_> = load
            .missing_comparisons
            .iter()
            .filter(|f| !f.is_mine())
            .cloned()
            .collect();
        let job = ComputeJob::new(&request.base, &to_compute, &request.common_files);
        let fresh = self.backend.compute(&job).await?;

        let report = self
            .engine
            .save_results(&request.base, &load.missing_comparisons, &fresh)
            .await;
        let warnings = report.warnings();
        for warning in &warnings {
            warn!("{warning}");
        }

        let computed: Vec<String> = load.missing_comparisons.iter().map(|f| f.name.clone()).collect();
        info!(cached = cached.len(), computed = computed.len(), "comparison finished");

        Ok(ComparisonOutcome {
            results: merge(&[load.cached_results, fresh]),
            cached,
            computed,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BaseFolderPaths, ComparisonFolder, MethodName};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Scores every requested folder with a fixed value and records jobs.
    #[derive(Default)]
    struct RecordingBackend {
        jobs: Mutex<Vec<ComputeJob>>,
    }

    #[async_trait]
    impl MetricBackend for RecordingBackend {
        async fn compute(&self, job: &ComputeJob) -> Result<Vec<PerFileResult>, BackendError> {
            self.jobs.lock().unwrap().push(job.clone());
            Ok(job
                .common_files
                .iter()
                .map(|file| {
                    let mut r = PerFileResult::new(file.as_str());
                    r.paths.insert(MethodName::Original, job.original.join(file));
                    r.paths.insert(MethodName::Gt, job.gt.join(file));
                    r.paths.insert(MethodName::Mine, job.mine.join(file));
                    r.iou_scores.insert(MethodName::Mine, 0.4);
                    for folder in &job.comparisons {
                        let m = MethodName::comparison(folder.name.as_str());
                        r.iou_scores.insert(m.clone(), 0.7);
                        r.paths.insert(m, folder.path.join(file));
                    }
                    r
                })
                .collect())
        }
    }

    fn request(comparisons: Vec<ComparisonFolder>) -> ComparisonRequest {
        ComparisonRequest {
            base: BaseFolderPaths {
                original: "/d/orig".into(),
                gt: "/d/gt".into(),
                mine: "/d/mine".into(),
            },
            comparisons,
            common_files: vec!["1.png".into(), "2.png".into()],
        }
    }

    #[tokio::test]
    async fn second_run_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(CacheEngine::open(dir.path()).await.unwrap());
        let backend = Arc::new(RecordingBackend::default());
        let runner = ComparisonRunner::new(engine, backend.clone());
        let req = request(vec![ComparisonFolder::new("A", "/d/a")]);

        let first = runner.run(&req).await.unwrap();
        assert_eq!(first.computed, vec!["mine".to_string(), "A".to_string()]);
        assert!(first.warnings.is_empty());

        let second = runner.run(&req).await.unwrap();
        assert!(second.computed.is_empty());
        assert_eq!(second.cached, vec!["mine".to_string(), "A".to_string()]);
        assert_eq!(second.results, first.results);
        assert_eq!(backend.jobs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_missing_comparisons_reach_backend() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(CacheEngine::open(dir.path()).await.unwrap());
        let backend = Arc::new(RecordingBackend::default());
        let runner = ComparisonRunner::new(engine, backend.clone());
        let a = ComparisonFolder::new("A", "/d/a");
        let b = ComparisonFolder::new("B", "/d/b");

        runner.run(&request(vec![a.clone()])).await.unwrap();
        let outcome = runner.run(&request(vec![a, b])).await.unwrap();

        let jobs = backend.jobs.lock().unwrap();
        let last = jobs.last().unwrap();
        assert_eq!(last.comparisons.len(), 1);
        assert_eq!(last.comparisons[0].name, "B");
        assert_eq!(outcome.computed, vec!["B".to_string()]);
        for r in &outcome.results {
            assert!(r.has_scores_for(&MethodName::comparison("A")));
            assert!(r.has_scores_for(&MethodName::comparison("B")));
            assert!(r.has_scores_for(&MethodName::Mine));
        }
    }

    #[tokio::test]
    async fn disabled_cache_always_computes() {
        let backend = Arc::new(RecordingBackend::default());
        let runner = ComparisonRunner::new(Arc::new(CacheEngine::disabled()), backend.clone());
        let req = request(vec![ComparisonFolder::new("A", "/d/a")]);

        runner.run(&req).await.unwrap();
        runner.run(&req).await.unwrap();
        assert_eq!(backend.jobs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_compute() {
        let backend = Arc::new(RecordingBackend::default());
        let runner = ComparisonRunner::new(Arc::new(CacheEngine::disabled()), backend.clone());
        let req = request(vec![ComparisonFolder::new("GT", "/d/x")]);

        assert!(matches!(
            runner.run(&req).await,
            Err(CompareError::Request(RequestError::ReservedName(_)))
        ));
        assert!(backend.jobs.lock().unwrap().is_empty());
    }
}
