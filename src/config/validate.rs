// src/config/validate.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{Manifest, RawManifest};
use crate::errors::{IncrError, Result};

impl TryFrom<RawManifest> for Manifest {
    type Error = IncrError;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, Self::Error> {
        let order = validate_raw_manifest(&raw)?;
        Ok(Manifest::new_unchecked(raw.config, raw.target, order))
    }
}

/// Validate `cfg` and return its targets in dependency order.
fn validate_raw_manifest(cfg: &RawManifest) -> Result<Vec<String>> {
    ensure_has_targets(cfg)?;
    validate_targets(cfg)?;
    validate_outputs(cfg)?;
    target_order(cfg)
}

fn ensure_has_targets(cfg: &RawManifest) -> Result<()> {
    if cfg.target.is_empty() {
        return Err(IncrError::ConfigError(
            "manifest must contain at least one [target.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_targets(cfg: &RawManifest) -> Result<()> {
    for (name, target) in cfg.target.iter() {
        if target.inputs.is_empty() && target.after.is_empty() {
            return Err(IncrError::ConfigError(format!(
                "target '{}' needs at least one entry in `inputs` or `after`",
                name
            )));
        }
        for dep in target.after.iter() {
            if dep == name {
                return Err(IncrError::ConfigError(format!(
                    "target '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if !cfg.target.contains_key(dep) {
                return Err(IncrError::ConfigError(format!(
                    "target '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_outputs(cfg: &RawManifest) -> Result<()> {
    let mut writers: HashMap<_, &str> = HashMap::new();
    for (name, target) in cfg.target.iter() {
        if target.inputs.contains(&target.output) {
            return Err(IncrError::ConfigError(format!(
                "target '{}' lists its own output {:?} as an input",
                name, target.output
            )));
        }
        if let Some(other) = writers.insert(&target.output, name.as_str()) {
            return Err(IncrError::ConfigError(format!(
                "targets '{}' and '{}' both write {:?}",
                other, name, target.output
            )));
        }
    }
    Ok(())
}

fn target_order(cfg: &RawManifest) -> Result<Vec<String>> {
    // Edge direction: dep -> target
    // For:
    //   [target.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.target.keys() {
        graph.add_node(name.as_str());
    }

    for (name, target) in cfg.target.iter() {
        for dep in target.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(IncrError::DagCycle(format!(
            "cycle detected in target graph involving target '{}'",
            cycle.node_id()
        ))),
    }
}
