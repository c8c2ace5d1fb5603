// src/watch/watcher.rs

use std::path::PathBuf;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{RuntimeEvent, TriggerReason};
use crate::errors::Result;
use crate::watch::debouncer::Debouncer;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchProfiles;

/// Handle for the filesystem watcher.
///
/// Exists mainly so the underlying `RecommendedWatcher` is kept alive for as
/// long as needed. Dropping the handle stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher observing `root` recursively.
///
/// Change events are debounced per path; once a path has been stable for
/// `debounce_ms`, it is matched against the stage profiles and the
/// reload-only patterns:
///
/// - every matching stage gets a `StageTriggered` event
/// - a path matching only a reload pattern gets a `ReloadHit` event,
///   bypassing the stage machinery entirely
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    profiles: WatchProfiles,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    debounce_ms: u64,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    // Can't log via tracing from this thread reliably.
                    eprintln!("buildpipe: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("buildpipe: file watch error: {err}");
            }
        },
        Config::default(),
    )
    .map_err(anyhow::Error::from)?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(anyhow::Error::from)?;

    info!(root = ?root, debounce_ms, "file watcher started");

    let poll = Duration::from_millis((debounce_ms / 2).max(10));

    tokio::spawn(async move {
        let mut debouncer = Debouncer::new(debounce_ms);
        let mut tick = tokio::time::interval(poll);

        loop {
            tokio::select! {
                event = event_rx.recv() => match event {
                    Some(event) => {
                        debug!(?event, "received notify event");
                        for path in event.paths {
                            debouncer.record(path);
                        }
                    }
                    None => break,
                },
                _ = tick.tick() => {
                    for path in debouncer.take_ready() {
                        if dispatch_path(&root, &path, &profiles, &runtime_tx)
                            .await
                            .is_err()
                        {
                            // Runtime is gone; stop watching.
                            return;
                        }
                    }
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

/// Map one stable path to triggers and send them to the runtime. Errors mean
/// the runtime channel is closed.
async fn dispatch_path(
    root: &PathBuf,
    path: &PathBuf,
    profiles: &WatchProfiles,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> std::result::Result<(), ()> {
    let rel = match relative_str(root, path) {
        Some(s) => s,
        None => {
            warn!(?path, ?root, "could not relativize event path");
            return Ok(());
        }
    };

    let stages = profiles.matching_stages(&rel);

    if !stages.is_empty() {
        debug!(path = %rel, ?stages, "change matched stage patterns");
        for stage in stages {
            info!(stage = %stage, path = %rel, "file change -> triggering stage");
            runtime_tx
                .send(RuntimeEvent::StageTriggered {
                    stage: stage.to_string(),
                    reason: TriggerReason::FileChange,
                })
                .await
                .map_err(|err| {
                    warn!("failed to send StageTriggered: {err}");
                })?;
        }
        return Ok(());
    }

    if profiles.matches_reload(&rel) {
        info!(path = %rel, "file change -> reload");
        runtime_tx
            .send(RuntimeEvent::ReloadHit { path: rel })
            .await
            .map_err(|err| {
                warn!("failed to send ReloadHit: {err}");
            })?;
    }

    Ok(())
}
