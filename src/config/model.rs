// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration as read from a `Buildpipe.toml`:
///
/// ```toml
/// [project]
/// source_root = "app"
/// dest_root = "dist"
///
/// [build]
/// stages = ["styles", "images", "fonts"]
/// clean = true
///
/// [dev]
/// stages = ["styles"]
/// reload = ["app/*.html", "app/js/**/*.js"]
///
/// [transform.style-compile]
/// cmd = "stylec --stdin"
/// output_ext = "css"
/// version = "1"
///
/// [stage.styles]
/// include = "app/styles/**/*.+(style|styl)"
/// transforms = ["style-compile"]
/// dest = "app/css"
/// ```
///
/// All sections are optional except `[stage.*]`; defaults are handled by
/// `serde` + `Default` impls. Semantic validation (graph acyclicity, known
/// references, well-formed globs) happens in [`crate::config::validate`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub settings: SettingsSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub dev: DevSection,

    /// External command transforms from `[transform.<name>]`.
    #[serde(default)]
    pub transform: BTreeMap<String, TransformConfig>,

    /// All stages from `[stage.<name>]`, keyed by stage name.
    #[serde(default)]
    pub stage: BTreeMap<String, StageConfig>,
}

/// Validated configuration. Construct via `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub project: ProjectSection,
    pub settings: SettingsSection,
    pub build: BuildSection,
    pub dev: DevSection,
    pub transform: BTreeMap<String, TransformConfig>,
    pub stage: BTreeMap<String, StageConfig>,
}

impl ConfigFile {
    /// Wrap raw config without re-validating. Callers must have run the
    /// checks in `config::validate` first.
    pub fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            project: raw.project,
            settings: raw.settings,
            build: raw.build,
            dev: raw.dev,
            transform: raw.transform,
            stage: raw.stage,
        }
    }

    /// Stage names for a `build` run: the configured list, or every stage
    /// when the list is empty.
    pub fn build_stage_names(&self) -> Vec<String> {
        if self.build.stages.is_empty() {
            self.stage.keys().cloned().collect()
        } else {
            self.build.stages.clone()
        }
    }

    /// Stage names for a `dev` session, same empty-list fallback.
    pub fn dev_stage_names(&self) -> Vec<String> {
        if self.dev.stages.is_empty() {
            self.stage.keys().cloned().collect()
        } else {
            self.dev.stages.clone()
        }
    }
}

/// `[project]` section: the two root trees.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    /// Root of the source tree, relative to the config file.
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,

    /// Root of the destination tree, emptied by the clean barrier.
    #[serde(default = "default_dest_root")]
    pub dest_root: PathBuf,
}

fn default_source_root() -> PathBuf {
    PathBuf::from("app")
}

fn default_dest_root() -> PathBuf {
    PathBuf::from("dist")
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            dest_root: default_dest_root(),
        }
    }
}

/// `[settings]` section: runtime tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsSection {
    /// Maximum number of queued re-runs to remember while a run is active.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,

    /// Window within which bursts of change events for a path collapse into
    /// one trigger.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_queue_length() -> usize {
    1
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            queue_length: default_queue_length(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// `[build]` section: the one-shot production entry point.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BuildSection {
    /// Stages to run. Dependencies are pulled in automatically; an empty
    /// list means all stages.
    #[serde(default)]
    pub stages: Vec<String>,

    /// Empty the destination root before the run (the barrier step).
    #[serde(default = "default_clean")]
    pub clean: bool,
}

fn default_clean() -> bool {
    true
}

/// `[dev]` section: the watch-mode entry point.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DevSection {
    /// Stages run at startup and re-run on matching file changes.
    #[serde(default)]
    pub stages: Vec<String>,

    /// Patterns that trigger a reload notification directly, without running
    /// any stage.
    #[serde(default)]
    pub reload: Vec<String>,
}

/// `[transform.<name>]` section: an external command transform.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformConfig {
    /// Shell command reading a file on stdin and writing the result to
    /// stdout.
    pub cmd: String,

    /// Rewrite the output file extension (e.g. `"css"`).
    #[serde(default)]
    pub output_ext: Option<String>,

    /// Cache-key component; bump when the command's behaviour changes.
    #[serde(default = "default_transform_version")]
    pub version: String,
}

fn default_transform_version() -> String {
    "1".to_string()
}

/// `[stage.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    /// Include glob, relative to the project root.
    pub include: String,

    /// Exclude globs; a path matching any of these never matches the stage.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Ordered transform chain. Defaults to a plain copy.
    #[serde(default = "default_transforms")]
    pub transforms: Vec<String>,

    /// Destination directory, relative to the project root.
    pub dest: PathBuf,

    /// Stages that must succeed before this one runs.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Extra watch globs beyond `include` (dev mode).
    #[serde(default)]
    pub watch: Vec<String>,
}

fn default_transforms() -> Vec<String> {
    vec!["copy".to_string()]
}
