// src/engine/queue.rs

use std::collections::{HashSet, VecDeque};

use tracing::{debug, warn};

use super::StageName;

/// Queue of triggers that arrive while a pipeline run is already executing.
///
/// This is what serializes a stage against itself: a re-trigger for a stage
/// that is part of the active run is recorded here instead of starting a
/// second concurrent execution, and a burst of such triggers coalesces into
/// a single queued batch. When the runtime goes idle it drains the queue and
/// starts exactly one follow-up run.
///
/// - Each queued entry is a *batch* of stage names to be triggered together
///   as one future run.
/// - `max_runs` bounds how many batches are remembered; the oldest are
///   dropped first.
#[derive(Debug)]
pub struct TriggerQueue {
    max_runs: usize,
    runs: VecDeque<HashSet<StageName>>,
}

impl TriggerQueue {
    /// `max_runs` is clamped to at least 1; a zero-length queue would make
    /// queuing semantics meaningless.
    pub fn new(max_runs: usize) -> Self {
        Self {
            max_runs: max_runs.max(1),
            runs: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Record that a stage was triggered while a run is in progress.
    ///
    /// The trigger is merged into the newest batch (coalescing multiple
    /// triggers into the same future run); a new batch is only created when
    /// none exists yet.
    pub fn record_trigger(&mut self, stage: &str) {
        let name = stage.to_string();

        if let Some(last_batch) = self.runs.back_mut() {
            let inserted = last_batch.insert(name.clone());
            debug!(stage = %name, inserted, "merged trigger into queued batch");
        } else {
            let mut batch = HashSet::new();
            batch.insert(name.clone());
            self.runs.push_back(batch);
            debug!(stage = %name, "created queued batch");
        }

        if self.runs.len() > self.max_runs {
            warn!(
                batches = self.runs.len(),
                max_runs = self.max_runs,
                "exceeded max queued runs; dropping oldest"
            );
            while self.runs.len() > self.max_runs {
                self.runs.pop_front();
            }
        }
    }

    /// Drain all pending batches, merged into a single set of stage names
    /// for the next run.
    pub fn drain_pending(&mut self) -> Vec<StageName> {
        let mut merged: HashSet<StageName> = HashSet::new();
        while let Some(batch) = self.runs.pop_front() {
            merged.extend(batch);
        }

        let stages: Vec<StageName> = merged.into_iter().collect();
        debug!(drained = stages.len(), "drained queued triggers into new run");
        stages
    }
}
