// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! A synchronous, deterministic core that consumes [`RuntimeEvent`]s and
//! produces a list of commands describing what the IO shell should do next.
//! The async shell (`engine::runtime::Runtime`) reads events from channels,
//! dispatches stages to the executor, and emits reload notifications.
//!
//! The core has no channels, no Tokio types, and performs no IO, so the
//! runtime semantics can be unit tested without processes or filesystems.

use std::collections::HashSet;

use crate::pipeline::{PipelineRun, ScheduledStage, Scheduler, StageRunState};

use super::queue::TriggerQueue;
use super::{RuntimeEvent, RuntimeOptions, StageName, StageOutcome};

/// Command produced by the pure core, executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these stages to the executor.
    DispatchStages(Vec<ScheduledStage>),
    /// Notify connected preview clients to reload.
    EmitReload { reason: String },
    /// A pipeline run finished; report it.
    ReportRun(PipelineRun),
    /// Exit the process (one-shot mode, idle with nothing queued).
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Pure core runtime state: the scheduler, the trigger queue, and the
/// runtime options.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    queue: TriggerQueue,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, queue_length: usize, options: RuntimeOptions) -> Self {
        Self {
            scheduler,
            queue: TriggerQueue::new(queue_length),
            options,
        }
    }

    /// Expose whether the scheduler is idle (for tests).
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// Expose queue emptiness (for tests).
    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::StageTriggered { stage, .. } => self.on_trigger(stage),
            RuntimeEvent::StageCompleted { stage, outcome } => self.on_completion(stage, outcome),
            RuntimeEvent::ReloadHit { path } => CoreStep::running(vec![CoreCommand::EmitReload {
                reason: path,
            }]),
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }

    /// Trigger handling:
    ///
    /// - Idle: start a new run seeded with this trigger plus anything that
    ///   was queued while the previous run was finishing.
    /// - Run active and the stage is *not* part of it: merge its graph
    ///   component into the active run immediately, so unrelated stages can
    ///   run concurrently under the same run ID.
    /// - Run active and the stage is `Pending` in it: nothing to do; the
    ///   run will pick up the current file content when the stage starts.
    /// - Run active and the stage already started or finished in it: record
    ///   it in the queue for one follow-up run. This is the per-stage run
    ///   serialization: a stage never executes concurrently with itself.
    fn on_trigger(&mut self, stage: StageName) -> CoreStep {
        if self.scheduler.is_idle() {
            let mut triggers: HashSet<StageName> =
                self.queue.drain_pending().into_iter().collect();
            triggers.insert(stage);
            return CoreStep::running(self.start_run_from(triggers.into_iter().collect()));
        }

        let mut commands = Vec::new();
        match self.scheduler.run_state_of(&stage) {
            None => {
                // Unknown stage; validated config should make this unreachable.
            }
            Some(StageRunState::NotInRun) => {
                let newly_ready = self.scheduler.handle_trigger(&stage);
                if !newly_ready.is_empty() {
                    commands.push(CoreCommand::DispatchStages(newly_ready));
                }
            }
            Some(StageRunState::Pending) => {
                // Not started yet; this run will see the change.
            }
            Some(_started_or_terminal) => {
                self.queue.record_trigger(&stage);
            }
        }

        CoreStep::running(commands)
    }

    fn on_completion(&mut self, stage: StageName, outcome: StageOutcome) -> CoreStep {
        let succeeded = matches!(outcome, StageOutcome::Success);
        let step = self.scheduler.step_completion(&stage, outcome);

        let mut commands = Vec::new();
        if succeeded && self.options.reload_on_success {
            commands.push(CoreCommand::EmitReload { reason: stage });
        }
        if !step.newly_scheduled.is_empty() {
            commands.push(CoreCommand::DispatchStages(step.newly_scheduled));
        }
        if let Some(run) = step.finished_run {
            commands.push(CoreCommand::ReportRun(run));
        }

        commands.extend(self.maybe_start_queued_run());

        let mut keep_running = true;
        if self.options.exit_when_idle && self.scheduler.is_idle() && self.queue.is_empty() {
            keep_running = false;
            commands.push(CoreCommand::RequestExit);
        }

        CoreStep {
            commands,
            keep_running,
        }
    }

    /// Seed a new run from initial triggers.
    fn start_run_from(&mut self, triggers: Vec<StageName>) -> Vec<CoreCommand> {
        if triggers.is_empty() {
            return Vec::new();
        }

        self.scheduler.start_new_run();

        let mut all_ready = Vec::new();
        for stage in triggers {
            all_ready.extend(self.scheduler.handle_trigger(&stage));
        }

        if all_ready.is_empty() {
            Vec::new()
        } else {
            vec![CoreCommand::DispatchStages(all_ready)]
        }
    }

    /// If the scheduler went idle and triggers are queued, start the
    /// follow-up run.
    fn maybe_start_queued_run(&mut self) -> Vec<CoreCommand> {
        if !self.scheduler.is_idle() {
            return Vec::new();
        }

        let triggers = self.queue.drain_pending();
        if triggers.is_empty() {
            return Vec::new();
        }

        self.start_run_from(triggers)
    }
}
