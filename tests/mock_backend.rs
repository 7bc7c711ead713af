//! Integration test using a mock metric backend.
//!
//! Validates the comparison pipeline end-to-end without running a real
//! scoring program by using a mock implementation of MetricBackend.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use maskcmp::backend::{BackendError, ComputeJob, MetricBackend};
use maskcmp::cache::CacheEngine;
use maskcmp::compare::{CompareError, ComparisonRunner};
use maskcmp::models::{BaseFolderPaths, ComparisonFolder, ComparisonRequest, MethodName, PerFileResult};

/// A mock backend that derives deterministic scores from folder names.
#[derive(Default)]
struct MockBackend {
    calls: AtomicUsize,
    /// Folder names seen across all calls, in order.
    seen: std::sync::Mutex<Vec<String>>,
    fail: bool,
}

impl MockBackend {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn score_for(name: &str) -> f64 {
    (name.len() % 10) as f64 / 10.0
}

#[async_trait]
impl MetricBackend for MockBackend {
    async fn compute(&self, job: &ComputeJob) -> Result<Vec<PerFileResult>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BackendError::Failed {
                status: "exit status: 1".into(),
                stderr: "mock failure".into(),
            });
        }
        let mut seen = self.seen.lock().unwrap();
        seen.extend(job.comparisons.iter().map(|c| c.name.clone()));

        Ok(job
            .common_files
            .iter()
            .map(|file| {
                let mut r = PerFileResult::new(file.as_str());
                r.paths.insert(MethodName::Original, job.original.join(file));
                r.paths.insert(MethodName::Gt, job.gt.join(file));
                r.paths.insert(MethodName::Mine, job.mine.join(file));
                r.iou_scores.insert(MethodName::Mine, 0.5);
                r.accuracy_scores.insert(MethodName::Mine, 0.95);
                r.dice_scores.insert(MethodName::Mine, 0.66);
                for folder in &job.comparisons {
                    let m = MethodName::comparison(folder.name.as_str());
                    r.iou_scores.insert(m.clone(), score_for(&folder.name));
                    r.accuracy_scores.insert(m.clone(), 0.9);
                    r.dice_scores.insert(m.clone(), 0.6);
                    r.paths.insert(m, folder.path.join(file));
                }
                r
            })
            .collect())
    }
}

fn request(comparisons: &[ComparisonFolder]) -> ComparisonRequest {
    ComparisonRequest {
        base: BaseFolderPaths {
            original: "/data/orig".into(),
            gt: "/data/gt".into(),
            mine: "/data/mine".into(),
        },
        comparisons: comparisons.to_vec(),
        common_files: vec!["a.png".into(), "b.png".into(), "c.png".into()],
    }
}

async fn runner(dir: &std::path::Path, backend: Arc<MockBackend>) -> ComparisonRunner {
    let engine = CacheEngine::open(dir).await.unwrap();
    engine.initialize().await.unwrap();
    ComparisonRunner::new(Arc::new(engine), backend)
}

#[tokio::test]
async fn pipeline_caches_and_reuses_results() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::default());
    let runner = runner(dir.path(), backend.clone()).await;
    let folders = [ComparisonFolder::new("unet", "/data/unet"), ComparisonFolder::new("sam", "/data/sam")];

    let first = runner.run(&request(&folders)).await.unwrap();
    assert_eq!(backend.calls(), 1);
    assert_eq!(first.results.len(), 3);
    assert_eq!(first.computed, vec!["mine", "unet", "sam"]);

    let second = runner.run(&request(&folders)).await.unwrap();
    assert_eq!(backend.calls(), 1, "fully cached request must not hit the backend");
    assert_eq!(second.results, first.results);
    assert_eq!(second.cached, vec!["mine", "unet", "sam"]);
}

#[tokio::test]
async fn pipeline_computes_only_new_folder() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::default());
    let runner = runner(dir.path(), backend.clone()).await;
    let unet = ComparisonFolder::new("unet", "/data/unet");
    let sam = ComparisonFolder::new("sam", "/data/sam");

    runner.run(&request(&[unet.clone()])).await.unwrap();
    let outcome = runner.run(&request(&[unet, sam])).await.unwrap();

    assert_eq!(backend.calls(), 2);
    assert_eq!(*backend.seen.lock().unwrap(), vec!["unet", "sam"]);
    for r in &outcome.results {
        assert_eq!(r.iou_scores[&MethodName::comparison("unet")], score_for("unet"));
        assert_eq!(r.iou_scores[&MethodName::comparison("sam")], score_for("sam"));
        assert_eq!(r.iou_scores[&MethodName::Mine], 0.5);
    }
}

#[tokio::test]
async fn pipeline_rename_is_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::default());
    let runner = runner(dir.path(), backend.clone()).await;
    let unet = ComparisonFolder::new("unet", "/data/unet");

    runner.run(&request(&[unet.clone()])).await.unwrap();
    let renamed = ComparisonFolder {
        name: "unet-final".into(),
        ..unet
    };
    let outcome = runner.run(&request(&[renamed])).await.unwrap();

    assert_eq!(backend.calls(), 1);
    let r = &outcome.results[0];
    assert!(r.iou_scores.contains_key(&MethodName::comparison("unet-final")));
    assert!(!r.iou_scores.contains_key(&MethodName::comparison("unet")));
}

#[tokio::test]
async fn backend_failure_propagates_and_caches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MockBackend::failing());
    let runner = runner(dir.path(), backend.clone()).await;

    let err = runner
        .run(&request(&[ComparisonFolder::new("unet", "/data/unet")]))
        .await
        .unwrap_err();
    assert!(matches!(err, CompareError::Backend(_)));

    let engine = CacheEngine::open(dir.path()).await.unwrap();
    assert_eq!(engine.stats().await.unwrap().entries, 0);
}

#[tokio::test]
async fn results_serialize_with_camel_case_keys() {
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(dir.path(), Arc::new(MockBackend::default())).await;
    let outcome = runner
        .run(&request(&[ComparisonFolder::new("unet", "/data/unet")]))
        .await
        .unwrap();

    let json = serde_json::to_value(&outcome).unwrap();
    let first = &json["results"][0];
    assert_eq!(first["filename"], "a.png");
    assert_eq!(first["iouScores"]["unet"], score_for("unet"));
    assert_eq!(first["paths"]["GT"], "/data/gt/a.png");
    assert!(json["warnings"].as_array().unwrap().is_empty());
}
