// src/pipeline/graph.rs

use std::collections::HashMap;

use crate::config::model::ConfigFile;

/// Internal node structure: immediate deps and dependents.
#[derive(Debug, Clone)]
struct GraphNode {
    /// Stages that must succeed before this one can run.
    deps: Vec<String>,
    /// Stages that depend on this one.
    dependents: Vec<String>,
}

/// In-memory DAG of stages keyed by name.
///
/// Acyclicity is validated in `config::validate`; this only keeps adjacency
/// information for scheduling and diagnostics.
#[derive(Debug, Clone)]
pub struct StageGraph {
    nodes: HashMap<String, GraphNode>,
}

impl StageGraph {
    /// Build the graph from validated config. Assumes all `depends_on`
    /// references are valid and there are no cycles.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::from_edges(
            cfg.stage
                .iter()
                .map(|(name, sc)| (name.clone(), sc.depends_on.clone())),
        )
    }

    /// Build from (name, deps) pairs.
    pub fn from_edges(edges: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        let mut nodes: HashMap<String, GraphNode> = HashMap::new();

        for (name, deps) in edges {
            nodes.insert(
                name,
                GraphNode {
                    deps,
                    dependents: Vec::new(),
                },
            );
        }

        let names: Vec<String> = nodes.keys().cloned().collect();
        for name in names {
            let deps = nodes
                .get(&name)
                .map(|n| n.deps.clone())
                .unwrap_or_default();
            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(name.clone());
                }
            }
        }

        Self { nodes }
    }

    pub fn stages(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// Immediate dependencies of a stage (its `depends_on` list).
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a stage.
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}
