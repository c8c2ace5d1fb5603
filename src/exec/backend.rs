// src/exec/backend.rs

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::cache::Cache;
use crate::engine::{RuntimeEvent, StageOutcome};
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::pipeline::ScheduledStage;
use crate::stage::{run_stage, Stage};
use crate::transform::TransformRegistry;

/// Trait abstracting how scheduled stages are executed.
///
/// Production uses [`StageExecutor`]; tests provide an implementation that
/// records dispatches and emits `StageCompleted` events directly.
pub trait ExecutorBackend: Send {
    /// Dispatch the given stages for execution.
    fn spawn_ready_stages(
        &mut self,
        stages: Vec<ScheduledStage>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Wait for all in-flight stage executions to finish (graceful drain on
    /// shutdown, so destination writes complete).
    fn drain(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Everything a stage execution needs, shared across spawned tasks.
pub struct ExecContext {
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub registry: Arc<TransformRegistry>,
    pub cache: Arc<Mutex<Box<dyn Cache>>>,
    pub stages: HashMap<String, Stage>,
}

impl std::fmt::Debug for ExecContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecContext")
            .field("root", &self.root)
            .field("stages", &self.stages.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Real executor backend.
///
/// Each dispatched stage runs in its own Tokio task; stages dispatched
/// together therefore execute concurrently. The scheduler keeps a stage
/// `Running` until its completion event arrives, so a given stage is never
/// in flight more than once.
pub struct StageExecutor {
    ctx: Arc<ExecContext>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    tasks: JoinSet<()>,
}

impl StageExecutor {
    pub fn new(ctx: ExecContext, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            runtime_tx,
            tasks: JoinSet::new(),
        }
    }
}

impl ExecutorBackend for StageExecutor {
    fn spawn_ready_stages(
        &mut self,
        stages: Vec<ScheduledStage>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for scheduled in stages {
                let ctx = Arc::clone(&self.ctx);
                let tx = self.runtime_tx.clone();

                self.tasks.spawn(async move {
                    let outcome = execute_one(&ctx, &scheduled).await;
                    // The receiver may already be gone during shutdown.
                    let _ = tx
                        .send(RuntimeEvent::StageCompleted {
                            stage: scheduled.name.clone(),
                            outcome,
                        })
                        .await;
                });
            }
            Ok(())
        })
    }

    fn drain(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            while let Some(res) = self.tasks.join_next().await {
                if let Err(err) = res {
                    error!(error = %err, "stage task panicked");
                }
            }
            debug!("executor drained");
            Ok(())
        })
    }
}

async fn execute_one(ctx: &ExecContext, scheduled: &ScheduledStage) -> StageOutcome {
    let stage = match ctx.stages.get(&scheduled.name) {
        Some(s) => s,
        None => {
            // Validated config should make this unreachable.
            return StageOutcome::Failed(format!("no such stage '{}'", scheduled.name));
        }
    };

    info!(
        stage = %stage.name,
        run_id = scheduled.run_id,
        "starting stage"
    );

    match run_stage(stage, &ctx.root, &ctx.fs, &ctx.registry, &ctx.cache).await {
        Ok(records) => {
            info!(
                stage = %stage.name,
                run_id = scheduled.run_id,
                written = records.len(),
                "stage succeeded"
            );
            StageOutcome::Success
        }
        Err(err) => {
            error!(
                stage = %stage.name,
                run_id = scheduled.run_id,
                error = %err,
                "stage failed"
            );
            StageOutcome::Failed(err.to_string())
        }
    }
}
