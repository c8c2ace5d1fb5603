// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod glob;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod reload;
pub mod stage;
pub mod transform;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cache::{Cache, FsCache, CACHE_DIR};
use crate::cli::{CliArgs, Mode};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{
    CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason,
};
use crate::exec::{ExecContext, StageExecutor};
use crate::fs::{FileSystem, RealFileSystem};
use crate::pipeline::Scheduler;
use crate::reload::{BroadcastNotifier, NullNotifier, ReloadNotifier};
use crate::stage::stages_from_config;
use crate::transform::TransformRegistry;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - scheduler / queue / runtime
/// - stage executor + transform registry + cache
/// - (dev mode) file watcher and reload notifier
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let root = config_root_dir(&config_path);

    match args.mode() {
        Mode::Build => run_build(&cfg, &root).await,
        Mode::Dev => run_dev(&cfg, &root).await,
        Mode::ClearCache => clear_cache(&root),
    }
}

/// Drop every memoized transform output.
fn clear_cache(root: &Path) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let mut cache = FsCache::new(root.join(CACHE_DIR), fs);
    cache.invalidate_all()?;
    println!("cleared transform output cache");
    Ok(())
}

/// One-shot production run: clean barrier, then the build stage set,
/// reported when the pipeline drains.
async fn run_build(cfg: &ConfigFile, root: &Path) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    // The clean barrier strictly precedes every stage: nothing is dispatched
    // until the destination root is empty. A clean failure aborts the run,
    // since no stage's output location is guaranteed valid after a partial
    // delete.
    if cfg.build.clean {
        clean_destination(fs.as_ref(), &root.join(&cfg.project.dest_root))?;
    }

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = build_executor(cfg, root, fs, rt_tx.clone());

    spawn_ctrl_c(rt_tx.clone());

    let stages = cfg.build_stage_names();
    info!(?stages, "seeding production stages");
    for stage in stages {
        rt_tx
            .send(RuntimeEvent::StageTriggered {
                stage,
                reason: TriggerReason::Startup,
            })
            .await?;
    }

    let core = CoreRuntime::new(
        Scheduler::from_config(cfg),
        cfg.settings.queue_length,
        RuntimeOptions {
            exit_when_idle: true,
            reload_on_success: false,
        },
    );
    let notifier: Arc<dyn ReloadNotifier> = Arc::new(NullNotifier);
    let runtime = Runtime::new(core, rt_rx, executor, notifier);

    match runtime.run().await? {
        Some(report) if report.all_succeeded() => Ok(()),
        Some(report) => bail!(
            "build failed: {} stage(s) did not succeed",
            report.failed_count()
        ),
        None => bail!("build finished without producing a pipeline run"),
    }
}

/// Watch session: initial run of the dev stage set, then re-runs driven by
/// file changes until interrupted. Stage failures are reported per run and
/// never end the session.
async fn run_dev(cfg: &ConfigFile, root: &Path) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = build_executor(cfg, root, fs, rt_tx.clone());

    spawn_ctrl_c(rt_tx.clone());

    let stages = cfg.dev_stage_names();
    info!(?stages, "seeding development stages");
    for stage in stages {
        rt_tx
            .send(RuntimeEvent::StageTriggered {
                stage,
                reason: TriggerReason::Startup,
            })
            .await?;
    }

    let profiles = crate::watch::build_watch_profiles(cfg)?;
    let _watcher_handle = crate::watch::spawn_watcher(
        root.to_path_buf(),
        profiles,
        rt_tx.clone(),
        cfg.settings.debounce_ms,
    )?;

    let notifier = Arc::new(BroadcastNotifier::new(16));

    let core = CoreRuntime::new(
        Scheduler::from_config(cfg),
        cfg.settings.queue_length,
        RuntimeOptions {
            exit_when_idle: false,
            reload_on_success: true,
        },
    );
    let runtime = Runtime::new(core, rt_rx, executor, notifier);

    runtime.run().await?;
    Ok(())
}

fn build_executor(
    cfg: &ConfigFile,
    root: &Path,
    fs: Arc<dyn FileSystem>,
    rt_tx: mpsc::Sender<RuntimeEvent>,
) -> StageExecutor {
    let cache: Arc<Mutex<Box<dyn Cache>>> = Arc::new(Mutex::new(Box::new(FsCache::new(
        root.join(CACHE_DIR),
        fs.clone(),
    ))));

    StageExecutor::new(
        ExecContext {
            root: root.to_path_buf(),
            fs,
            registry: Arc::new(TransformRegistry::from_config(cfg)),
            cache,
            stages: stages_from_config(cfg),
        },
        rt_tx,
    )
}

/// Empty the destination root, recreating it as an empty directory.
fn clean_destination(fs: &dyn FileSystem, dest_root: &Path) -> Result<()> {
    info!(dest = ?dest_root, "cleaning destination root");
    fs.remove_dir_all(dest_root)?;
    fs.create_dir_all(dest_root)?;
    Ok(())
}

/// Ctrl-C -> graceful shutdown.
fn spawn_ctrl_c(tx: mpsc::Sender<RuntimeEvent>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
    });
}

/// Figure out a sensible project root.
///
/// - If the config path has a non-empty parent (e.g. "configs/Buildpipe.toml"),
///   use that directory.
/// - If it's a bare filename like "Buildpipe.toml" (parent = ""), fall back
///   to the current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: print stages, transforms, and entry points.
fn print_dry_run(cfg: &ConfigFile) {
    println!("buildpipe dry-run");
    println!("  project.source_root = {:?}", cfg.project.source_root);
    println!("  project.dest_root   = {:?}", cfg.project.dest_root);
    println!("  build: stages = {:?}, clean = {}", cfg.build_stage_names(), cfg.build.clean);
    println!("  dev:   stages = {:?}, reload = {:?}", cfg.dev_stage_names(), cfg.dev.reload);
    println!();

    println!("stages ({}):", cfg.stage.len());
    for (name, stage) in cfg.stage.iter() {
        println!("  - {name}");
        println!("      include: {}", stage.include);
        if !stage.exclude.is_empty() {
            println!("      exclude: {:?}", stage.exclude);
        }
        println!("      transforms: {:?}", stage.transforms);
        println!("      dest: {:?}", stage.dest);
        if !stage.depends_on.is_empty() {
            println!("      depends_on: {:?}", stage.depends_on);
        }
        if !stage.watch.is_empty() {
            println!("      watch: {:?}", stage.watch);
        }
    }

    if !cfg.transform.is_empty() {
        println!();
        println!("transforms ({}):", cfg.transform.len());
        for (name, tc) in cfg.transform.iter() {
            println!("  - {name}: cmd = {:?}, version = {}", tc.cmd, tc.version);
        }
    }

    debug!("dry-run complete (no execution)");
}
