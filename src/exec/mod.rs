// src/exec/mod.rs

//! Stage execution layer.
//!
//! [`backend`] provides the `ExecutorBackend` trait the runtime talks to,
//! and the concrete [`StageExecutor`] that runs stages via
//! [`crate::stage::run_stage`] and reports completion events back to the
//! orchestration runtime. Tests swap in a fake backend instead of touching
//! the filesystem.

pub mod backend;

pub use backend::{ExecContext, ExecutorBackend, StageExecutor};
