// src/graph/update.rs

//! Write propagation: lazy invalidation and the eager rebuild walk.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use super::arena::Graph;
use super::node::{Node, NodeId};
use crate::errors::GraphError;
use crate::types::UpdatePolicy;

impl Graph {
    /// Propagate a change of `node` according to its own update policy.
    pub fn update(&mut self, node: impl Into<NodeId>) -> Result<(), GraphError> {
        let node = node.into();
        match self.node(node).policy() {
            UpdatePolicy::Lazy => self.invalidate(node),
            UpdatePolicy::Eager => self.propagate(node),
        }
    }

    /// Mark every computable reachable from `node` through parent edges as
    /// needing a rebuild. Cells are traversed but never marked.
    ///
    /// Stale computables that rebuild themselves and have no parents are
    /// recomputed before this returns.
    pub fn invalidate(&mut self, node: impl Into<NodeId>) -> Result<(), GraphError> {
        let node = node.into();
        let reached = self.dependents(node);

        let mut marked = 0usize;
        for &id in &reached {
            if let Node::Computable(computable) = self.node_mut(id) {
                computable.should_rebuild = true;
                marked += 1;
            }
        }
        debug!(key = %self.key(node), marked, "invalidated dependents");

        let outputs: Vec<NodeId> = reached
            .into_iter()
            .filter(|&id| match self.node(id) {
                Node::Computable(computable) => {
                    computable.rebuild_when_stale && computable.parents.is_empty()
                }
                Node::Cell(_) => false,
            })
            .collect();
        for output in outputs {
            self.compute_node(output)?;
        }
        Ok(())
    }

    /// Rebuild every computable reachable from `node` (and `node` itself)
    /// right away, children before parents.
    ///
    /// Everything reached is marked stale first, so a failing build leaves
    /// the rest of the walk to the next `compute`.
    pub fn propagate(&mut self, node: impl Into<NodeId>) -> Result<(), GraphError> {
        let node = node.into();
        let reached = self.dependents(node);
        for &id in &reached {
            if let Node::Computable(computable) = self.node_mut(id) {
                computable.should_rebuild = true;
            }
        }
        let order = self.children_first(&reached);

        let mut rebuilt = 0usize;
        for id in order {
            if matches!(self.node(id), Node::Computable(_)) {
                self.rebuild(id)?;
                rebuilt += 1;
            }
        }
        debug!(key = %self.key(node), rebuilt, "propagated change eagerly");
        Ok(())
    }

    /// `start` followed by every node reachable from it through parent edges,
    /// in breadth-first order, each exactly once.
    pub(crate) fn dependents(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            order.push(id);
            queue.extend(
                self.parents(id)
                    .iter()
                    .copied()
                    .filter(|parent| !visited.contains(parent)),
            );
        }
        order
    }

    /// Order `nodes` so that every node comes after all of its children that
    /// are also in `nodes` (Kahn's algorithm restricted to the subset).
    fn children_first(&self, nodes: &[NodeId]) -> Vec<NodeId> {
        let members: HashSet<NodeId> = nodes.iter().copied().collect();
        let mut in_degree: HashMap<NodeId, usize> = nodes
            .iter()
            .map(|&id| {
                let pending = self
                    .children(id)
                    .iter()
                    .filter(|child| members.contains(child))
                    .count();
                (id, pending)
            })
            .collect();

        let mut ready: VecDeque<NodeId> = nodes
            .iter()
            .copied()
            .filter(|id| in_degree[id] == 0)
            .collect();
        let mut order = Vec::with_capacity(nodes.len());

        while let Some(id) = ready.pop_front() {
            order.push(id);
            for parent in self.parents(id) {
                if let Some(degree) = in_degree.get_mut(parent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(*parent);
                    }
                }
            }
        }
        order
    }
}
