// src/graph/roots.rs

use std::collections::HashSet;

use super::arena::Graph;
use super::node::{Node, NodeId};

impl Graph {
    /// Computables reachable from `node` through parent edges that have no
    /// parents of their own. Each root is reported once, in depth-first
    /// order. A parentless computable is its own root; a parentless cell has
    /// none.
    pub fn roots(&self, node: impl Into<NodeId>) -> Vec<NodeId> {
        let mut roots = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![node.into()];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let node = self.node(id);
            if matches!(node, Node::Computable(_)) && node.parents().is_empty() {
                roots.push(id);
                continue;
            }
            stack.extend(node.parents().iter().rev().copied());
        }
        roots
    }
}
