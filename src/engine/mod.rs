// src/engine/mod.rs

//! Orchestration engine.
//!
//! Ties together:
//! - the stage scheduler
//! - the trigger queue (what happens when triggers arrive mid-run)
//! - the main runtime event loop reacting to file-watch triggers, stage
//!   completions, soft-reload hits, and shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

/// Canonical stage name type used throughout the engine.
pub type StageName = String;

/// Outcome of a stage execution for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Success,
    /// The stage failed; carries the rendered cause for the run report.
    Failed(String),
}

/// Why a stage was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Seeded at startup (initial build/dev run).
    Startup,
    /// Triggered by a filesystem change.
    FileChange,
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Exit once the pipeline is idle and no triggers are queued
    /// (one-shot `build` mode).
    pub exit_when_idle: bool,
    /// Emit a reload notification after each successful stage (dev mode).
    pub reload_on_success: bool,
}

/// Events flowing into the runtime from watchers and executors.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A stage should be (logically) triggered.
    StageTriggered {
        stage: StageName,
        reason: TriggerReason,
    },
    /// A stage finished with a concrete outcome.
    StageCompleted {
        stage: StageName,
        outcome: StageOutcome,
    },
    /// A reload-only watch pattern matched; no stage is involved.
    ReloadHit { path: String },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod queue;
pub mod runtime;

pub use self::core::{CoreCommand, CoreRuntime, CoreStep};
pub use self::queue::TriggerQueue;
pub use self::runtime::Runtime;
