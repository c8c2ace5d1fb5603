// tests/watcher_events.rs

//! Real filesystem watcher: change events become stage triggers, reload-only
//! patterns bypass the stage machinery.

use std::error::Error;
use std::fs;
use std::time::Duration;

use buildpipe::engine::{RuntimeEvent, TriggerReason};
use buildpipe::watch::{build_watch_profiles, spawn_watcher};
use buildpipe_test_utils::builders::{ConfigFileBuilder, StageConfigBuilder};
use buildpipe_test_utils::init_tracing;
use tokio::sync::mpsc;
use tokio::time::timeout;

type TestResult = Result<(), Box<dyn Error>>;

const EVENT_WAIT: Duration = Duration::from_secs(10);

/// Receive events until one matches, ignoring unrelated noise (editors and
/// platforms differ in how many events a single write produces).
async fn recv_matching<F>(
    rx: &mut mpsc::Receiver<RuntimeEvent>,
    mut matches: F,
) -> Option<RuntimeEvent>
where
    F: FnMut(&RuntimeEvent) -> bool,
{
    timeout(EVENT_WAIT, async {
        loop {
            match rx.recv().await {
                Some(ev) if matches(&ev) => return Some(ev),
                Some(_) => continue,
                None => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

#[tokio::test]
async fn change_to_watched_pattern_triggers_the_bound_stage() -> TestResult {
    init_tracing();

    let tmp = tempfile::tempdir()?;
    fs::create_dir_all(tmp.path().join("app/styles"))?;

    let cfg = ConfigFileBuilder::new()
        .with_stage(
            "styles",
            StageConfigBuilder::new("app/styles/**/*.style", "app/css").build(),
        )
        .with_dev_stages(&["styles"])
        .build();

    let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(64);
    let _handle = spawn_watcher(tmp.path().to_path_buf(), build_watch_profiles(&cfg)?, tx, 50)?;

    // Give the watcher a moment to register before producing events.
    tokio::time::sleep(Duration::from_millis(200)).await;
    fs::write(tmp.path().join("app/styles/a.style"), "body {}")?;

    let event = recv_matching(&mut rx, |ev| {
        matches!(ev, RuntimeEvent::StageTriggered { stage, .. } if stage == "styles")
    })
    .await
    .expect("expected a StageTriggered event for 'styles'");

    match event {
        RuntimeEvent::StageTriggered { reason, .. } => {
            assert_eq!(reason, TriggerReason::FileChange);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn reload_only_pattern_emits_reload_hit_not_a_stage_trigger() -> TestResult {
    init_tracing();

    let tmp = tempfile::tempdir()?;
    fs::create_dir_all(tmp.path().join("app/styles"))?;

    let cfg = ConfigFileBuilder::new()
        .with_stage(
            "styles",
            StageConfigBuilder::new("app/styles/**/*.style", "app/css").build(),
        )
        .with_dev_stages(&["styles"])
        .with_reload_pattern("app/*.html")
        .build();

    let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(64);
    let _handle = spawn_watcher(tmp.path().to_path_buf(), build_watch_profiles(&cfg)?, tx, 50)?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    fs::write(tmp.path().join("app/index.html"), "<html>")?;

    let event = recv_matching(&mut rx, |ev| matches!(ev, RuntimeEvent::ReloadHit { .. }))
        .await
        .expect("expected a ReloadHit event");

    match event {
        RuntimeEvent::ReloadHit { path } => assert_eq!(path, "app/index.html"),
        other => panic!("unexpected event: {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn unrelated_files_trigger_nothing() -> TestResult {
    init_tracing();

    let tmp = tempfile::tempdir()?;
    fs::create_dir_all(tmp.path().join("app/styles"))?;
    fs::create_dir_all(tmp.path().join("notes"))?;

    let cfg = ConfigFileBuilder::new()
        .with_stage(
            "styles",
            StageConfigBuilder::new("app/styles/**/*.style", "app/css").build(),
        )
        .with_dev_stages(&["styles"])
        .build();

    let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(64);
    let _handle = spawn_watcher(tmp.path().to_path_buf(), build_watch_profiles(&cfg)?, tx, 50)?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    fs::write(tmp.path().join("notes/todo.txt"), "nothing to see")?;

    let got = timeout(Duration::from_millis(500), rx.recv()).await;
    assert!(got.is_err(), "no event expected for unmatched paths, got {got:?}");

    Ok(())
}
