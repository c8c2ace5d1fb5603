#![allow(dead_code)]

use std::collections::BTreeMap;

use buildpipe::config::{
    BuildSection, ConfigFile, DevSection, ProjectSection, RawConfigFile, SettingsSection,
    StageConfig, TransformConfig,
};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                project: ProjectSection::default(),
                settings: SettingsSection::default(),
                build: BuildSection::default(),
                dev: DevSection::default(),
                transform: BTreeMap::new(),
                stage: BTreeMap::new(),
            },
        }
    }

    pub fn with_stage(mut self, name: &str, stage: StageConfig) -> Self {
        self.config.stage.insert(name.to_string(), stage);
        self
    }

    pub fn with_command_transform(mut self, name: &str, cmd: &str) -> Self {
        self.config.transform.insert(
            name.to_string(),
            TransformConfig {
                cmd: cmd.to_string(),
                output_ext: None,
                version: "1".to_string(),
            },
        );
        self
    }

    pub fn with_transform(mut self, name: &str, transform: TransformConfig) -> Self {
        self.config.transform.insert(name.to_string(), transform);
        self
    }

    pub fn with_source_root(mut self, root: &str) -> Self {
        self.config.project.source_root = root.into();
        self
    }

    pub fn with_dest_root(mut self, root: &str) -> Self {
        self.config.project.dest_root = root.into();
        self
    }

    pub fn with_build_stages(mut self, stages: &[&str]) -> Self {
        self.config.build.stages = stages.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_clean(mut self, clean: bool) -> Self {
        self.config.build.clean = clean;
        self
    }

    pub fn with_dev_stages(mut self, stages: &[&str]) -> Self {
        self.config.dev.stages = stages.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_reload_pattern(mut self, pattern: &str) -> Self {
        self.config.dev.reload.push(pattern.to_string());
        self
    }

    pub fn with_queue_length(mut self, len: usize) -> Self {
        self.config.settings.queue_length = len;
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.settings.debounce_ms = ms;
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// The raw config, for tests exercising validation failures.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StageConfig`.
pub struct StageConfigBuilder {
    stage: StageConfig,
}

impl StageConfigBuilder {
    pub fn new(include: &str, dest: &str) -> Self {
        Self {
            stage: StageConfig {
                include: include.to_string(),
                exclude: vec![],
                transforms: vec!["copy".to_string()],
                dest: dest.into(),
                depends_on: vec![],
                watch: vec![],
            },
        }
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.stage.exclude.push(pattern.to_string());
        self
    }

    /// Replace the default `copy` chain with the given transforms.
    pub fn transforms(mut self, names: &[&str]) -> Self {
        self.stage.transforms = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.stage.depends_on.push(dep.to_string());
        self
    }

    pub fn watch(mut self, pattern: &str) -> Self {
        self.stage.watch.push(pattern.to_string());
        self
    }

    pub fn build(self) -> StageConfig {
        self.stage
    }
}
