// src/errors.rs

//! Crate-wide error types and helpers.

use std::path::PathBuf;

use thiserror::Error;

/// A named transform failed, optionally on a specific input file.
#[derive(Error, Debug, Clone)]
#[error("transform '{transform}' failed{}: {reason}", fmt_path(.path))]
pub struct TransformError {
    pub transform: String,
    pub path: Option<PathBuf>,
    pub reason: String,
}

impl TransformError {
    pub fn new(transform: impl Into<String>, path: Option<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            transform: transform.into(),
            path,
            reason: reason.into(),
        }
    }
}

fn fmt_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" on '{}'", p.display()),
        None => String::new(),
    }
}

/// A stage failed, wrapping the underlying pattern/transform/IO cause.
#[derive(Error, Debug)]
#[error("stage '{stage}' failed: {source}")]
pub struct StageError {
    pub stage: String,
    #[source]
    pub source: Box<BuildpipeError>,
}

impl StageError {
    pub fn new(stage: impl Into<String>, source: impl Into<BuildpipeError>) -> Self {
        Self {
            stage: stage.into(),
            source: Box::new(source.into()),
        }
    }
}

#[derive(Error, Debug)]
pub enum BuildpipeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("malformed glob pattern '{pattern}': {reason}")]
    PatternError { pattern: String, reason: String },

    #[error(transparent)]
    TransformError(#[from] TransformError),

    #[error(transparent)]
    StageError(Box<StageError>),

    #[error("cache store error: {0}")]
    CacheError(String),

    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Cycle detected in stage graph: {0}")]
    DagCycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<StageError> for BuildpipeError {
    fn from(err: StageError) -> Self {
        BuildpipeError::StageError(Box::new(err))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildpipeError>;
