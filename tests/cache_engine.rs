//! End-to-end scenarios for the incremental cache through `CacheEngine`.

use maskcmp::cache::{CacheEngine, VersionCheck};
use maskcmp::coordinator::merge;
use maskcmp::models::{BaseFolderPaths, ComparisonFolder, ComparisonRequest, MethodName, PerFileResult};
use pretty_assertions::assert_eq;

fn base() -> BaseFolderPaths {
    BaseFolderPaths {
        original: "/data/orig".into(),
        gt: "/data/gt".into(),
        mine: "/data/mine".into(),
    }
}

fn request(comparisons: &[ComparisonFolder]) -> ComparisonRequest {
    ComparisonRequest {
        base: base(),
        comparisons: comparisons.to_vec(),
        common_files: vec!["1.png".into(), "2.png".into(), "3.png".into()],
    }
}

/// What a backend would return for `folders` (plus `mine`).
fn computed(folders: &[ComparisonFolder]) -> Vec<PerFileResult> {
    ["1.png", "2.png", "3.png"]
        .iter()
        .map(|file| {
            let mut r = PerFileResult::new(*file);
            r.paths.insert(MethodName::Original, format!("/data/orig/{file}").into());
            r.paths.insert(MethodName::Gt, format!("/data/gt/{file}").into());
            r.paths.insert(MethodName::Mine, format!("/data/mine/{file}").into());
            r.iou_scores.insert(MethodName::Mine, 0.42);
            for folder in folders {
                r.iou_scores.insert(folder.method(), 0.7);
                r.dice_scores.insert(folder.method(), 0.8);
                r.paths.insert(folder.method(), folder.path.join(file));
            }
            r
        })
        .collect()
}

async fn engine(dir: &std::path::Path, version: &str) -> CacheEngine {
    let engine = CacheEngine::open(dir).await.unwrap().with_version(version);
    engine.initialize().await.unwrap();
    engine
}

#[tokio::test]
async fn empty_cache_miss_then_hit() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path(), "1.0.0").await;
    let a = ComparisonFolder::new("A", "/data/a");

    let load = engine.load_incremental(&request(&[a.clone()])).await;
    assert!(load.cached_results.is_empty());
    assert_eq!(load.missing_comparisons, vec![base().mine_folder(), a.clone()]);

    engine
        .save_results(&base(), &load.missing_comparisons, &computed(&[a.clone()]))
        .await;

    let load = engine.load_incremental(&request(&[a.clone()])).await;
    assert!(load.missing_comparisons.is_empty());
    assert_eq!(load.cached_results.len(), 3);
    assert!(engine.has_cached(&base(), &a.path).await);
}

#[tokio::test]
async fn partial_hit_then_merge_covers_both() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path(), "1.0.0").await;
    let a = ComparisonFolder::new("A", "/data/a");
    let b = ComparisonFolder::new("B", "/data/b");
    engine
        .save_results(&base(), &[base().mine_folder(), a.clone()], &computed(&[a.clone()]))
        .await;

    let load = engine.load_incremental(&request(&[a.clone(), b.clone()])).await;
    assert_eq!(load.cached, vec![base().mine_folder(), a.clone()]);
    assert_eq!(load.missing_comparisons, vec![b.clone()]);

    let fresh = computed(&[b.clone()]);
    let report = engine.save_results(&base(), &load.missing_comparisons, &fresh).await;
    assert!(report.is_clean());

    let merged = merge(&[load.cached_results, fresh]);
    assert_eq!(merged.len(), 3);
    for r in &merged {
        assert!(r.has_scores_for(&a.method()), "{} lacks A", r.filename);
        assert!(r.has_scores_for(&b.method()), "{} lacks B", r.filename);
    }
    assert_eq!(engine.cached_for(&base()).await.len(), 3);
}

#[tokio::test]
async fn rename_is_not_cache_busting() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path(), "1.0.0").await;
    let a = ComparisonFolder::new("A", "/data/a");
    engine
        .save_results(&base(), &[base().mine_folder(), a.clone()], &computed(&[a.clone()]))
        .await;

    let renamed = ComparisonFolder {
        name: "A-v2".into(),
        ..a
    };
    let load = engine.load_incremental(&request(&[renamed.clone()])).await;
    assert!(load.missing_comparisons.is_empty());
    for r in &load.cached_results {
        assert!(r.has_scores_for(&renamed.method()));
        assert!(!r.has_scores_for(&MethodName::comparison("A")));
        assert!(!r.paths.contains_key(&MethodName::comparison("A")));
    }
}

#[tokio::test]
async fn version_change_clears_before_first_read() {
    let dir = tempfile::tempdir().unwrap();
    let a = ComparisonFolder::new("A", "/data/a");
    {
        let old = engine(dir.path(), "1.0.0").await;
        old.save_results(&base(), &[base().mine_folder(), a.clone()], &computed(&[a.clone()]))
            .await;
        assert_eq!(old.stats().await.unwrap().entries, 2);
    }

    let new = CacheEngine::open(dir.path()).await.unwrap().with_version("1.1.0");
    let check = new.initialize().await.unwrap();
    assert_eq!(
        check,
        VersionCheck::Invalidated {
            previous: Some("1.0.0".into()),
            removed: 2
        }
    );
    let load = new.load_incremental(&request(&[a])).await;
    assert_eq!(load.missing_comparisons.len(), 2);
    assert_eq!(new.metadata().await.unwrap().version, "1.1.0");
}

#[tokio::test]
async fn cleanup_zero_days_evicts_everything() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path(), "1.0.0").await;
    let a = ComparisonFolder::new("A", "/data/a");
    engine
        .save_results(&base(), &[base().mine_folder(), a.clone()], &computed(&[a.clone()]))
        .await;

    assert_eq!(engine.cleanup(0).await.unwrap(), 2);
    assert_eq!(engine.metadata().await.unwrap().count, 0);
    assert!(engine.list_all_entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn clear_all_makes_everything_miss() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path(), "1.0.0").await;
    let a = ComparisonFolder::new("A", "/data/a");
    engine
        .save_results(&base(), &[base().mine_folder(), a.clone()], &computed(&[a.clone()]))
        .await;

    engine.clear_all().await.unwrap();
    let load = engine.load_incremental(&request(&[a])).await;
    assert!(load.cached_results.is_empty());
    assert_eq!(load.missing_comparisons.len(), 2);
}

#[tokio::test]
async fn classify_twice_yields_same_partition() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path(), "1.0.0").await;
    let a = ComparisonFolder::new("A", "/data/a");
    let b = ComparisonFolder::new("B", "/data/b");
    engine
        .save_results(&base(), &[a.clone()], &computed(&[a.clone()]))
        .await;

    let once = engine.load_incremental(&request(&[a.clone(), b.clone()])).await;
    let twice = engine.load_incremental(&request(&[a, b])).await;
    assert_eq!(once, twice);
}

#[tokio::test]
async fn stored_results_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(dir.path(), "1.0.0").await;
    let a = ComparisonFolder::new("A", "/data/a");
    let fresh = computed(&[a.clone()]);
    engine.save_results(&base(), &[a.clone()], &fresh).await;

    let stored = engine.cached_for(&base()).await;
    assert_eq!(stored.len(), 1);
    let expected: Vec<_> = fresh.iter().filter_map(|r| r.project(&a.method())).collect();
    assert_eq!(stored[0].results, expected);
}

#[tokio::test]
async fn shared_engine_keeps_concurrent_index_updates() {
    let dir = tempfile::tempdir().unwrap();
    let engine = std::sync::Arc::new(engine(dir.path(), "1.0.0").await);

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8 {
        let engine = std::sync::Arc::clone(&engine);
        tasks.spawn(async move {
            let folder = ComparisonFolder::new(format!("c{i}"), format!("/data/c{i}"));
            engine
                .save_results(&base(), std::slice::from_ref(&folder), &computed(std::slice::from_ref(&folder)))
                .await
        });
    }
    while let Some(report) = tasks.join_next().await {
        assert!(report.unwrap().is_clean());
    }

    assert_eq!(engine.cached_for(&base()).await.len(), 8);
}
