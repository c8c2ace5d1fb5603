// src/config/mod.rs

//! Pipeline configuration: TOML model, loading, and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    BuildSection, ConfigFile, DevSection, ProjectSection, RawConfigFile, SettingsSection,
    StageConfig, TransformConfig,
};
