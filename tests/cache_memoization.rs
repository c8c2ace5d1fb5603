// tests/cache_memoization.rs

//! Cache correctness: a hit stands in for re-running the transform, distinct
//! inputs never collide, and destination output is identical either way.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use buildpipe::cache::{cache_key, Cache, FsCache, MemoryCache};
use buildpipe::fs::{FileSystem, MockFileSystem, RealFileSystem};
use buildpipe::glob::GlobPattern;
use buildpipe::record::FileRecord;
use buildpipe::stage::{run_stage, Stage};
use buildpipe::transform::{Transform, TransformRegistry, TransformResult};
use buildpipe_test_utils::init_tracing;

/// Uppercases content and counts how many times it actually ran.
struct CountingShrink {
    runs: Arc<AtomicUsize>,
}

impl Transform for CountingShrink {
    fn name(&self) -> &str {
        "shrink"
    }

    fn version(&self) -> &str {
        "1"
    }

    fn apply(
        &self,
        inputs: Vec<FileRecord>,
    ) -> Pin<Box<dyn Future<Output = TransformResult> + Send + '_>> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            Ok(inputs
                .iter()
                .map(|r| r.with_content(r.content().to_ascii_uppercase()))
                .collect())
        })
    }
}

fn images_stage() -> Stage {
    Stage {
        name: "images".to_string(),
        pattern: GlobPattern::new("app/images/**/*.png", vec![]),
        transforms: vec!["shrink".to_string()],
        dest: "dist/images".into(),
        depends_on: vec![],
        watch: vec![],
    }
}

struct Harness {
    /// Handle to the mock; shares state with `fs`.
    mock: MockFileSystem,
    fs: Arc<dyn FileSystem>,
    registry: TransformRegistry,
    cache: Arc<Mutex<Box<dyn Cache>>>,
    runs: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let mock = MockFileSystem::new();
    mock.add_file("app/images/logo.png", "raw-logo");
    mock.add_file("app/images/icons/ok.png", "raw-ok");

    let runs = Arc::new(AtomicUsize::new(0));
    let mut registry = TransformRegistry::new();
    registry.insert(Arc::new(CountingShrink {
        runs: Arc::clone(&runs),
    }));

    Harness {
        fs: Arc::new(mock.clone()),
        mock,
        registry,
        cache: Arc::new(Mutex::new(Box::new(MemoryCache::new()))),
        runs,
    }
}

#[tokio::test]
async fn unchanged_inputs_reuse_memoized_output() {
    init_tracing();
    let h = harness();
    let stage = images_stage();
    let root = Path::new(".");

    let first = run_stage(&stage, root, &h.fs, &h.registry, &h.cache)
        .await
        .unwrap();
    assert_eq!(h.runs.load(Ordering::SeqCst), 1);

    let second = run_stage(&stage, root, &h.fs, &h.registry, &h.cache)
        .await
        .unwrap();
    assert_eq!(
        h.runs.load(Ordering::SeqCst),
        1,
        "second run must be a cache hit"
    );

    // Hit output is behaviorally equivalent to re-running the transform.
    assert_eq!(first, second);
    assert_eq!(
        h.fs.read(Path::new("dist/images/logo.png")).unwrap(),
        b"RAW-LOGO".to_vec()
    );
}

#[tokio::test]
async fn changed_content_misses_and_rewrites_destination() {
    init_tracing();
    let h = harness();
    let stage = images_stage();
    let root = Path::new(".");

    run_stage(&stage, root, &h.fs, &h.registry, &h.cache)
        .await
        .unwrap();
    assert_eq!(h.runs.load(Ordering::SeqCst), 1);

    // New content under the same path: different fingerprint, fresh run.
    h.mock.add_file("app/images/logo.png", "raw-logo-v2");

    run_stage(&stage, root, &h.fs, &h.registry, &h.cache)
        .await
        .unwrap();
    assert_eq!(h.runs.load(Ordering::SeqCst), 2);
    assert_eq!(
        h.fs.read(Path::new("dist/images/logo.png")).unwrap(),
        b"RAW-LOGO-V2".to_vec()
    );
}

#[tokio::test]
async fn adding_a_file_changes_the_input_set_key() {
    init_tracing();
    let h = harness();
    let stage = images_stage();
    let root = Path::new(".");

    run_stage(&stage, root, &h.fs, &h.registry, &h.cache)
        .await
        .unwrap();
    h.mock.add_file("app/images/new.png", "raw-new");

    run_stage(&stage, root, &h.fs, &h.registry, &h.cache)
        .await
        .unwrap();
    assert_eq!(h.runs.load(Ordering::SeqCst), 2);
    assert!(h.fs.is_file(Path::new("dist/images/new.png")));
}

#[tokio::test]
async fn fs_cache_round_trips_and_invalidates() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let mut cache = FsCache::new(tmp.path().join("cache"), fs);

    let outputs = vec![
        FileRecord::new("css/styles.min.css", b"body{}".to_vec()),
        FileRecord::new("css/extra.min.css", b"a{}".to_vec()),
    ];
    let key = cache_key("minify", "2", &outputs);

    assert!(cache.get(&key).unwrap().is_none());
    cache.put(&key, &outputs).unwrap();

    let hit = cache.get(&key).unwrap().expect("entry should exist");
    assert_eq!(hit, outputs);

    // A different transform version never sees this entry.
    let other_key = cache_key("minify", "3", &outputs);
    assert!(cache.get(&other_key).unwrap().is_none());

    cache.invalidate_all().unwrap();
    assert!(cache.get(&key).unwrap().is_none());
}
