// src/pipeline/scheduler.rs

use std::collections::{BTreeMap, HashSet};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::config::model::ConfigFile;
use crate::engine::{StageName, StageOutcome};
use crate::pipeline::graph::StageGraph;
use crate::pipeline::report::{PipelineRun, StageStatus};

/// Per-run state of a stage (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    /// Part of this run, waiting on dependencies.
    Pending,
    /// Dispatched to the executor.
    Running,
    DoneSuccess,
    DoneFailed,
    /// Never ran in this run because an ancestor failed.
    Skipped,
}

/// Public, read-only view of a stage's per-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRunState {
    /// Not participating in the current run.
    NotInRun,
    Pending,
    Running,
    DoneSuccess,
    DoneFailed,
    Skipped,
}

impl From<Option<RunState>> for StageRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => StageRunState::NotInRun,
            Some(RunState::Pending) => StageRunState::Pending,
            Some(RunState::Running) => StageRunState::Running,
            Some(RunState::DoneSuccess) => StageRunState::DoneSuccess,
            Some(RunState::DoneFailed) => StageRunState::DoneFailed,
            Some(RunState::Skipped) => StageRunState::Skipped,
        }
    }
}

/// Per-stage bookkeeping: static deps plus per-run state.
#[derive(Debug, Clone)]
struct StageEntry {
    name: StageName,
    deps: Vec<StageName>,
    run_state: Option<RunState>,
    /// Failure or skip cause for this run.
    cause: Option<String>,
    /// Last run ID in which this stage succeeded.
    last_successful_run: Option<u64>,
}

/// A stage the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledStage {
    pub name: StageName,
    /// Monotonically increasing pipeline run identifier; all stages of the
    /// same run share it.
    pub run_id: u64,
}

/// Structured result of a single scheduler step, for tests and the engine
/// core.
#[derive(Debug, Clone)]
pub struct SchedulerStep {
    /// Stages that became ready to run as a result of this step.
    pub newly_scheduled: Vec<ScheduledStage>,
    /// Stages newly marked skipped because an ancestor failed.
    pub newly_skipped: Vec<StageName>,
    /// The completed run summary, when this step finished the run.
    pub finished_run: Option<PipelineRun>,
}

impl SchedulerStep {
    fn empty() -> Self {
        Self {
            newly_scheduled: Vec::new(),
            newly_skipped: Vec::new(),
            finished_run: None,
        }
    }

    pub fn run_just_finished(&self) -> bool {
        self.finished_run.is_some()
    }
}

/// Holds the immutable stage graph plus mutable per-run state.
///
/// Responsibilities:
/// - deciding which stages participate in a run when one is triggered
///   (the trigger, its dependents, and any never-built dependencies)
/// - deciding when a participating stage is ready (deps satisfied)
/// - marking stages succeeded/failed, skipping dependents of failures
/// - detecting run completion and producing the [`PipelineRun`] report
#[derive(Debug)]
pub struct Scheduler {
    graph: StageGraph,
    entries: BTreeMap<StageName, StageEntry>,
    run_counter: u64,
    current_run_id: Option<u64>,
    /// Dispatch order within the current run, for the report.
    dispatch_order: Vec<StageName>,
    run_started: SystemTime,
}

impl Scheduler {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::from_graph(StageGraph::from_config(cfg))
    }

    pub fn from_graph(graph: StageGraph) -> Self {
        let mut entries = BTreeMap::new();
        for name in graph.stages() {
            entries.insert(
                name.to_string(),
                StageEntry {
                    name: name.to_string(),
                    deps: graph.dependencies_of(name).to_vec(),
                    run_state: None,
                    cause: None,
                    last_successful_run: None,
                },
            );
        }

        Self {
            graph,
            entries,
            run_counter: 0,
            current_run_id: None,
            dispatch_order: Vec::new(),
            run_started: SystemTime::now(),
        }
    }

    /// `true` when no run is active.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.graph.stages()
    }

    /// Read-only view of the given stage's run state. `None` for unknown
    /// stages.
    pub fn run_state_of(&self, stage: &str) -> Option<StageRunState> {
        let entry = self.entries.get(stage)?;
        Some(entry.run_state.into())
    }

    /// Names of stages participating in the active run. Empty when idle.
    pub fn stages_in_current_run(&self) -> Vec<StageName> {
        if self.current_run_id.is_none() {
            return Vec::new();
        }
        self.entries
            .values()
            .filter(|e| e.run_state.is_some())
            .map(|e| e.name.clone())
            .collect()
    }

    /// Whether the dependencies of `stage` are satisfied for the current run.
    /// `None` if the stage is unknown.
    pub fn deps_satisfied(&self, stage: &str) -> Option<bool> {
        let entry = self.entries.get(stage)?;
        Some(self.deps_satisfied_for(entry))
    }

    /// Start a new run, resetting per-run state but keeping historical
    /// success information for dependency satisfaction on later runs.
    pub fn start_new_run(&mut self) {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);
        self.dispatch_order.clear();
        self.run_started = SystemTime::now();

        for entry in self.entries.values_mut() {
            entry.run_state = None;
            entry.cause = None;
        }

        debug!(run_id = self.run_counter, "scheduler: starting new pipeline run");
    }

    /// Handle a trigger for a stage name (production API).
    pub fn handle_trigger(&mut self, stage: &str) -> Vec<ScheduledStage> {
        self.step_trigger(stage).newly_scheduled
    }

    /// Handle completion of a stage with a concrete outcome (production API).
    pub fn handle_completion(&mut self, stage: &str, outcome: StageOutcome) -> Vec<ScheduledStage> {
        self.step_completion(stage, outcome).newly_scheduled
    }

    /// Manual-step variant of `handle_trigger` returning a rich
    /// [`SchedulerStep`].
    pub fn step_trigger(&mut self, stage: &str) -> SchedulerStep {
        if self.current_run_id.is_none() {
            self.start_new_run();
        }

        if self.entries.contains_key(stage) {
            self.mark_run_participants(stage);
        } else {
            warn!(stage = %stage, "trigger for unknown stage; ignoring");
        }

        let newly_scheduled = self.collect_new_ready_stages();
        let finished_run = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_skipped: Vec::new(),
            finished_run,
        }
    }

    /// Manual-step variant of `handle_completion`.
    pub fn step_completion(&mut self, stage: &str, outcome: StageOutcome) -> SchedulerStep {
        let run_id = match self.current_run_id {
            Some(id) => id,
            None => {
                warn!(stage = %stage, "completion with no active run; ignoring");
                return SchedulerStep::empty();
            }
        };

        let mut step = SchedulerStep::empty();

        match self.entries.get_mut(stage) {
            Some(entry) => match outcome {
                StageOutcome::Success => {
                    entry.run_state = Some(RunState::DoneSuccess);
                    entry.last_successful_run = Some(run_id);
                    debug!(stage = %stage, run_id, "stage completed successfully");
                }
                StageOutcome::Failed(cause) => {
                    entry.run_state = Some(RunState::DoneFailed);
                    entry.cause = Some(cause.clone());
                    warn!(
                        stage = %stage,
                        run_id,
                        cause = %cause,
                        "stage failed; skipping dependents in this run"
                    );
                    step.newly_skipped = self.mark_dependents_skipped(stage);
                }
            },
            None => {
                warn!(stage = %stage, "completion for unknown stage; ignoring");
                return step;
            }
        }

        step.newly_scheduled = self.collect_new_ready_stages();
        step.finished_run = self.maybe_finish_run();
        step
    }

    /// Decide which stages participate in the run rooted at `trigger`:
    ///
    /// - downstream: the trigger and all transitive dependents, so a changed
    ///   input rebuilds everything derived from it;
    /// - upstream: any dependency of a participant that has never succeeded
    ///   is pulled in too, so a run can always make progress instead of
    ///   waiting forever on a stage nobody scheduled.
    fn mark_run_participants(&mut self, trigger: &str) {
        let mut visited: HashSet<StageName> = HashSet::new();
        let mut stack: Vec<StageName> = vec![trigger.to_string()];

        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            if let Some(entry) = self.entries.get_mut(&name) {
                if entry.run_state.is_none() {
                    entry.run_state = Some(RunState::Pending);
                    debug!(stage = %name, "marked Pending for this run");
                }
                stack.extend(self.graph.dependents_of(&name).iter().cloned());
            } else {
                warn!(stage = %name, "node in graph not present in entry map");
            }
        }

        let mut stack: Vec<StageName> = visited.iter().cloned().collect();
        while let Some(name) = stack.pop() {
            let deps = self.graph.dependencies_of(&name).to_vec();
            for dep in deps {
                if visited.contains(&dep) {
                    continue;
                }
                let pull = self
                    .entries
                    .get(&dep)
                    .map(|e| e.run_state.is_none() && e.last_successful_run.is_none())
                    .unwrap_or(false);
                if pull {
                    visited.insert(dep.clone());
                    if let Some(entry) = self.entries.get_mut(&dep) {
                        entry.run_state = Some(RunState::Pending);
                        debug!(stage = %dep, "pulled never-built dependency into this run");
                    }
                    stack.push(dep);
                }
            }
        }
    }

    /// Mark all participating dependents (transitively) of a failed stage as
    /// `Skipped` for this run. Returns the newly skipped names.
    fn mark_dependents_skipped(&mut self, failed: &str) -> Vec<StageName> {
        let mut stack: Vec<StageName> = self.graph.dependents_of(failed).to_vec();
        let mut newly_skipped = Vec::new();

        while let Some(name) = stack.pop() {
            if let Some(entry) = self.entries.get_mut(&name) {
                match entry.run_state {
                    Some(RunState::Pending) | Some(RunState::Running) => {
                        entry.run_state = Some(RunState::Skipped);
                        entry.cause = Some(format!("dependency '{failed}' failed"));
                        debug!(
                            stage = %name,
                            failed = %failed,
                            "skipping dependent due to upstream failure"
                        );
                        newly_skipped.push(name.clone());
                        stack.extend(self.graph.dependents_of(&name).iter().cloned());
                    }
                    Some(RunState::DoneSuccess)
                    | Some(RunState::DoneFailed)
                    | Some(RunState::Skipped)
                    | None => {
                        // Already terminal, or not participating in this run.
                    }
                }
            }
        }

        newly_skipped
    }

    fn deps_satisfied_for(&self, entry: &StageEntry) -> bool {
        for dep_name in &entry.deps {
            let dep = match self.entries.get(dep_name) {
                Some(d) => d,
                None => {
                    warn!(stage = %entry.name, dep = %dep_name, "dependency missing from entry map");
                    return false;
                }
            };

            match dep.run_state {
                Some(RunState::DoneSuccess) => {}
                Some(RunState::DoneFailed) | Some(RunState::Skipped) => return false,
                Some(RunState::Pending) | Some(RunState::Running) => return false,
                None => {
                    // Not part of this run; rely on history.
                    if dep.last_successful_run.is_none() {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Collect `Pending` stages whose dependencies are satisfied, mark them
    /// `Running`, and return them for dispatch. Stages with no ordering
    /// dependency between them come back together and run as a concurrent
    /// group.
    fn collect_new_ready_stages(&mut self) -> Vec<ScheduledStage> {
        let run_id = self.current_run_id.unwrap_or(0);

        let candidates: Vec<StageName> = self
            .entries
            .values()
            .filter(|e| {
                matches!(e.run_state, Some(RunState::Pending)) && self.deps_satisfied_for(e)
            })
            .map(|e| e.name.clone())
            .collect();

        let mut ready = Vec::with_capacity(candidates.len());
        for name in candidates {
            if let Some(entry) = self.entries.get_mut(&name) {
                info!(
                    stage = %entry.name,
                    run_id,
                    "dependencies satisfied; dispatching stage"
                );
                entry.run_state = Some(RunState::Running);
                self.dispatch_order.push(entry.name.clone());
                ready.push(ScheduledStage {
                    name: entry.name.clone(),
                    run_id,
                });
            }
        }

        ready
    }

    /// Finish the run once every participant is terminal, producing the
    /// report and clearing `current_run_id`.
    fn maybe_finish_run(&mut self) -> Option<PipelineRun> {
        let run_id = self.current_run_id?;

        let any_open = self.entries.values().any(|e| {
            matches!(
                e.run_state,
                Some(RunState::Pending) | Some(RunState::Running)
            )
        });
        if any_open {
            return None;
        }

        let mut statuses = std::collections::BTreeMap::new();
        for entry in self.entries.values() {
            let status = match entry.run_state {
                Some(RunState::DoneSuccess) => StageStatus::Success,
                Some(RunState::DoneFailed) => StageStatus::Failed {
                    cause: entry.cause.clone().unwrap_or_else(|| "unknown".to_string()),
                },
                Some(RunState::Skipped) => StageStatus::Skipped {
                    cause: entry.cause.clone().unwrap_or_else(|| "unknown".to_string()),
                },
                Some(RunState::Pending) | Some(RunState::Running) | None => continue,
            };
            statuses.insert(entry.name.clone(), status);
        }

        let run = PipelineRun {
            run_id,
            stages_executed: self.dispatch_order.clone(),
            started_at: self.run_started,
            completed_at: SystemTime::now(),
            statuses,
        };

        info!(
            run_id,
            stages = run.statuses.len(),
            "scheduler: all stages terminal; run finished"
        );
        self.current_run_id = None;
        Some(run)
    }
}
