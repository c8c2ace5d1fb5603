// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BuildpipeError, Result};
use crate::glob::GlobPattern;
use crate::transform::registry::BUILTIN_TRANSFORMS;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildpipeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_stages(cfg)?;
    validate_settings(cfg)?;
    validate_stage_references(cfg)?;
    validate_entry_points(cfg)?;
    validate_patterns(cfg)?;
    validate_graph(cfg)?;
    Ok(())
}

fn ensure_has_stages(cfg: &RawConfigFile) -> Result<()> {
    if cfg.stage.is_empty() {
        return Err(BuildpipeError::ConfigError(
            "config must contain at least one [stage.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_settings(cfg: &RawConfigFile) -> Result<()> {
    if cfg.settings.queue_length == 0 {
        return Err(BuildpipeError::ConfigError(
            "[settings].queue_length must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_stage_references(cfg: &RawConfigFile) -> Result<()> {
    for (name, stage) in cfg.stage.iter() {
        for dep in stage.depends_on.iter() {
            if !cfg.stage.contains_key(dep) {
                return Err(BuildpipeError::ConfigError(format!(
                    "stage '{}' has unknown dependency '{}' in `depends_on`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(BuildpipeError::ConfigError(format!(
                    "stage '{}' cannot depend on itself in `depends_on`",
                    name
                )));
            }
        }

        if stage.transforms.is_empty() {
            return Err(BuildpipeError::ConfigError(format!(
                "stage '{}' has an empty `transforms` list",
                name
            )));
        }
        for transform in stage.transforms.iter() {
            let known = BUILTIN_TRANSFORMS.contains(&transform.as_str())
                || cfg.transform.contains_key(transform);
            if !known {
                return Err(BuildpipeError::ConfigError(format!(
                    "stage '{}' references unknown transform '{}'",
                    name, transform
                )));
            }
        }
    }
    Ok(())
}

fn validate_entry_points(cfg: &RawConfigFile) -> Result<()> {
    for name in cfg.build.stages.iter() {
        if !cfg.stage.contains_key(name) {
            return Err(BuildpipeError::ConfigError(format!(
                "[build].stages references unknown stage '{}'",
                name
            )));
        }
    }
    for name in cfg.dev.stages.iter() {
        if !cfg.stage.contains_key(name) {
            return Err(BuildpipeError::ConfigError(format!(
                "[dev].stages references unknown stage '{}'",
                name
            )));
        }
    }
    Ok(())
}

/// Compile every glob in the config so malformed expressions fail at load
/// time, not mid-run.
fn validate_patterns(cfg: &RawConfigFile) -> Result<()> {
    for (name, stage) in cfg.stage.iter() {
        GlobPattern::new(stage.include.clone(), stage.exclude.clone())
            .compile()
            .map_err(|e| annotate_stage(name, e))?;
        if !stage.watch.is_empty() {
            crate::glob::build_globset(&stage.watch).map_err(|e| annotate_stage(name, e))?;
        }
    }
    if !cfg.dev.reload.is_empty() {
        crate::glob::build_globset(&cfg.dev.reload)?;
    }
    Ok(())
}

fn annotate_stage(stage: &str, err: BuildpipeError) -> BuildpipeError {
    match err {
        BuildpipeError::PatternError { pattern, reason } => BuildpipeError::PatternError {
            pattern,
            reason: format!("in stage '{stage}': {reason}"),
        },
        other => other,
    }
}

fn validate_graph(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> stage. For
    //   [stage.styles]
    //   depends_on = ["clean"]
    // we add edge clean -> styles.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.stage.keys() {
        graph.add_node(name.as_str());
    }

    for (name, stage) in cfg.stage.iter() {
        for dep in stage.depends_on.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(BuildpipeError::DagCycle(format!(
                "cycle detected in stage graph involving stage '{}'",
                node
            )))
        }
    }
}
