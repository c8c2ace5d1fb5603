// src/pipeline/report.rs

//! Per-invocation run summary.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::SystemTime;

/// Final state of a stage within one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Success,
    Failed { cause: String },
    /// The stage never ran because an ancestor failed.
    Skipped { cause: String },
}

/// Ephemeral summary of one pipeline run, created per invocation and
/// discarded after reporting.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: u64,
    /// Stage names in dispatch order.
    pub stages_executed: Vec<String>,
    pub started_at: SystemTime,
    pub completed_at: SystemTime,
    pub statuses: BTreeMap<String, StageStatus>,
}

impl PipelineRun {
    pub fn all_succeeded(&self) -> bool {
        self.statuses
            .values()
            .all(|s| matches!(s, StageStatus::Success))
    }

    pub fn failed_count(&self) -> usize {
        self.statuses
            .iter()
            .filter(|(_, s)| !matches!(s, StageStatus::Success))
            .count()
    }

    /// Human-readable summary, one line per stage.
    pub fn render(&self) -> String {
        let elapsed = self
            .completed_at
            .duration_since(self.started_at)
            .unwrap_or_default();

        let mut out = String::new();
        let _ = writeln!(
            out,
            "pipeline run #{} completed in {:.2?} ({} stage(s))",
            self.run_id,
            elapsed,
            self.statuses.len()
        );

        let width = self.statuses.keys().map(|n| n.len()).max().unwrap_or(0);
        for (name, status) in &self.statuses {
            let line = match status {
                StageStatus::Success => format!("  {name:<width$}  ok"),
                StageStatus::Failed { cause } => format!("  {name:<width$}  FAILED: {cause}"),
                StageStatus::Skipped { cause } => format!("  {name:<width$}  skipped: {cause}"),
            };
            let _ = writeln!(out, "{line}");
        }

        out
    }
}
