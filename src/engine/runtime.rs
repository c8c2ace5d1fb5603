// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::pipeline::{PipelineRun, ScheduledStage};
use crate::reload::{ReloadEvent, ReloadNotifier};

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Async IO shell around [`CoreRuntime`].
///
/// Reads `RuntimeEvent`s from the channel, feeds them to the pure core, and
/// executes the returned commands: dispatching stages to the executor,
/// emitting reload notifications, printing run reports.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    notifier: Arc<dyn ReloadNotifier>,
    last_run: Option<PipelineRun>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        notifier: Arc<dyn ReloadNotifier>,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            notifier,
            last_run: None,
        }
    }

    /// Main event loop. Returns the last completed run report, if any.
    ///
    /// On shutdown the executor is drained first, so in-flight destination
    /// writes complete before the process exits.
    pub async fn run(mut self) -> Result<Option<PipelineRun>> {
        info!("buildpipe runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        // Stop accepting events so stage tasks never block on a full channel,
        // then wait for in-flight stages to finish their writes.
        self.event_rx.close();
        self.executor.drain().await?;

        info!("runtime exiting");
        Ok(self.last_run)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchStages(stages) => {
                self.spawn_ready(stages).await?;
            }
            CoreCommand::EmitReload { reason } => {
                self.notifier.notify(ReloadEvent { reason });
            }
            CoreCommand::ReportRun(run) => {
                info!(
                    run_id = run.run_id,
                    failed = run.failed_count(),
                    "pipeline run finished"
                );
                print!("{}", run.render());
                self.last_run = Some(run);
            }
            CoreCommand::RequestExit => {
                info!("core issued RequestExit command");
            }
        }
        Ok(())
    }

    async fn spawn_ready(&mut self, stages: Vec<ScheduledStage>) -> Result<()> {
        if stages.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = stages.iter().map(|s| s.name.as_str()).collect();
        debug!(?names, "dispatching ready stages");

        self.executor.spawn_ready_stages(stages).await
    }
}
