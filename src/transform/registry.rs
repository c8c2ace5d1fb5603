// src/transform/registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::model::ConfigFile;

use super::{CommandTransform, CopyTransform, Transform};

/// Transform names available without a `[transform.<name>]` section.
pub const BUILTIN_TRANSFORMS: &[&str] = &["copy"];

/// Maps the transform names referenced by stages to implementations.
///
/// Built once from validated config; config-declared commands may shadow a
/// builtin of the same name.
pub struct TransformRegistry {
    map: HashMap<String, Arc<dyn Transform>>,
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("names", &self.map.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TransformRegistry {
    /// Registry with only the builtins.
    pub fn new() -> Self {
        let mut map: HashMap<String, Arc<dyn Transform>> = HashMap::new();
        map.insert("copy".to_string(), Arc::new(CopyTransform));
        Self { map }
    }

    /// Register (or shadow) a transform under its name.
    pub fn insert(&mut self, transform: Arc<dyn Transform>) {
        self.map.insert(transform.name().to_string(), transform);
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut registry = Self::new();
        for (name, tc) in cfg.transform.iter() {
            registry.insert(Arc::new(CommandTransform::new(name, tc)));
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Transform>> {
        self.map.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}
