// src/graph/compute.rs

use std::collections::HashSet;

use tracing::{debug, trace};

use super::arena::Graph;
use super::node::{ComputableId, Inputs, Node, NodeId};
use crate::errors::GraphError;

impl Graph {
    /// Bring `target` up to date, rebuilding only stale computables below it.
    ///
    /// A shared stale child is rebuilt once per call even when it is reached
    /// through several paths. On failure the nodes that were not rebuilt stay
    /// stale and the next call retries them.
    pub fn compute<T>(&mut self, target: ComputableId<T>) -> Result<ComputableId<T>, GraphError> {
        self.compute_node(target.node())?;
        Ok(target)
    }

    pub(crate) fn compute_node(&mut self, target: NodeId) -> Result<(), GraphError> {
        if !self.node(target).is_stale() {
            trace!(key = %self.key(target), "already up to date");
            return Ok(());
        }

        let levels = self.stale_levels(target);
        let mut rebuilt = HashSet::new();
        for level in levels.iter().rev() {
            for &id in level {
                if rebuilt.insert(id) {
                    self.rebuild(id)?;
                }
            }
        }

        debug!(
            key = %self.key(target),
            levels = levels.len(),
            rebuilt = rebuilt.len(),
            "computed"
        );
        Ok(())
    }

    /// Stale computables grouped by distance from `target`; level 0 is the
    /// target itself. A node reachable along paths of different lengths
    /// appears on several levels.
    fn stale_levels(&self, target: NodeId) -> Vec<Vec<NodeId>> {
        let mut levels = vec![vec![target]];
        loop {
            let mut seen = HashSet::new();
            let next: Vec<NodeId> = levels
                .last()
                .into_iter()
                .flatten()
                .flat_map(|&id| self.children(id).iter().copied())
                .filter(|&child| self.node(child).is_stale() && seen.insert(child))
                .collect();
            if next.is_empty() {
                return levels;
            }
            levels.push(next);
        }
    }

    /// Run the build function of one computable against the current values
    /// of its children and store the result.
    pub(crate) fn rebuild(&mut self, id: NodeId) -> Result<(), GraphError> {
        let value = match self.node(id) {
            Node::Computable(computable) => {
                let inputs = Inputs::new(self, id, &computable.children);
                (computable.build)(&inputs).map_err(|source| GraphError::Build {
                    key: computable.key.clone(),
                    source,
                })?
            }
            Node::Cell(_) => return Ok(()),
        };

        let computable = self.computable_node_mut(id);
        computable.value = Some(value);
        computable.should_rebuild = false;
        trace!(key = %computable.key, "rebuilt");
        Ok(())
    }
}
