// src/stage/mod.rs

//! Stage descriptions and execution.
//!
//! A [`Stage`] is a pure description: select files with a glob pattern, fold
//! them through an ordered chain of transforms, write the results under a
//! destination directory. It owns no runtime state between runs; per-run
//! bookkeeping lives in [`crate::pipeline::Scheduler`].

pub mod runner;

pub use runner::run_stage;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::model::{ConfigFile, StageConfig};
use crate::glob::GlobPattern;

/// Declarative pipeline step.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub pattern: GlobPattern,
    /// Transform names, applied left to right.
    pub transforms: Vec<String>,
    /// Destination directory, relative to the project root.
    pub dest: PathBuf,
    pub depends_on: Vec<String>,
    /// Extra watch globs beyond the include pattern.
    pub watch: Vec<String>,
}

impl Stage {
    pub fn from_config(name: impl Into<String>, cfg: &StageConfig) -> Self {
        Self {
            name: name.into(),
            pattern: GlobPattern::new(cfg.include.clone(), cfg.exclude.clone()),
            transforms: cfg.transforms.clone(),
            dest: cfg.dest.clone(),
            depends_on: cfg.depends_on.clone(),
            watch: cfg.watch.clone(),
        }
    }
}

/// Materialize all stage descriptions from validated config.
pub fn stages_from_config(cfg: &ConfigFile) -> HashMap<String, Stage> {
    cfg.stage
        .iter()
        .map(|(name, sc)| (name.clone(), Stage::from_config(name.clone(), sc)))
        .collect()
}
