// src/watch/patterns.rs

use std::fmt;

use globset::GlobSet;

use crate::config::model::ConfigFile;
use crate::engine::StageName;
use crate::errors::Result;
use crate::glob::build_globset;
use crate::stage::Stage;

/// Compiled watch globs for a single stage.
///
/// A stage watches its own source pattern plus any extra `watch` globs, with
/// the stage's excludes applied on top. Paths passed to [`matches`] are
/// relative to the project root, with forward slashes.
///
/// [`matches`]: StageWatchProfile::matches
#[derive(Clone)]
pub struct StageWatchProfile {
    name: StageName,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for StageWatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageWatchProfile")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl StageWatchProfile {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }

    /// Build the profile for one stage description.
    pub fn for_stage(stage: &Stage) -> Result<Self> {
        let mut watch_patterns = vec![stage.pattern.include().to_string()];
        watch_patterns.extend(stage.watch.iter().cloned());

        let watch_set = build_globset(&watch_patterns)?;
        let exclude_set = if stage.pattern.excludes().is_empty() {
            None
        } else {
            Some(build_globset(stage.pattern.excludes())?)
        };

        Ok(Self {
            name: stage.name.clone(),
            watch_set,
            exclude_set,
        })
    }
}

/// Everything the watcher needs to map a changed path to an action.
#[derive(Debug, Clone)]
pub struct WatchProfiles {
    /// One profile per watched (dev) stage.
    pub stages: Vec<StageWatchProfile>,
    /// Patterns bound to a reload notification instead of a stage.
    pub reload: Option<GlobSet>,
}

impl WatchProfiles {
    /// Stage names whose profiles match the given root-relative path.
    pub fn matching_stages(&self, rel_path: &str) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|p| p.matches(rel_path))
            .map(|p| p.name())
            .collect()
    }

    /// Whether the path hits a reload-only subscription.
    pub fn matches_reload(&self, rel_path: &str) -> bool {
        self.reload
            .as_ref()
            .map(|set| set.is_match(rel_path))
            .unwrap_or(false)
    }
}

/// Compile watch profiles for the dev stage set plus the reload-only
/// patterns from `[dev] reload`.
pub fn build_watch_profiles(cfg: &ConfigFile) -> Result<WatchProfiles> {
    let mut stages = Vec::new();
    for name in cfg.dev_stage_names() {
        if let Some(sc) = cfg.stage.get(&name) {
            let stage = Stage::from_config(name, sc);
            stages.push(StageWatchProfile::for_stage(&stage)?);
        }
    }

    let reload = if cfg.dev.reload.is_empty() {
        None
    } else {
        Some(build_globset(&cfg.dev.reload)?)
    };

    Ok(WatchProfiles { stages, reload })
}
