// src/graph/arena.rs

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use super::keys::{KeyGenerator, SequentialKeys};
use super::node::{
    Builder, CellId, CellNode, ComputableId, ComputableNode, Handle, Inputs, Node, NodeId, Value,
};
use crate::errors::GraphError;
use crate::types::UpdatePolicy;

/// Arena owning every node of one dependency graph.
///
/// Nodes are never removed. Handles from one graph must not be used with
/// another; doing so is a programming error and panics.
pub struct Graph {
    nodes: Vec<Node>,
    keys: Box<dyn KeyGenerator>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph").field("nodes", &self.nodes).finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::with_keys(SequentialKeys::default())
    }

    /// Create a graph that names unkeyed nodes with `keys`.
    pub fn with_keys(keys: impl KeyGenerator + 'static) -> Self {
        Self {
            nodes: Vec::new(),
            keys: Box::new(keys),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: impl Into<NodeId>) -> &Node {
        &self.nodes[id.into().0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    pub fn key(&self, id: impl Into<NodeId>) -> &str {
        self.node(id).key()
    }

    pub fn parents(&self, id: impl Into<NodeId>) -> &[NodeId] {
        self.node(id).parents()
    }

    pub fn children(&self, id: impl Into<NodeId>) -> &[NodeId] {
        self.node(id).children()
    }

    // ---------------------------------------------------------------------
    // Cells
    // ---------------------------------------------------------------------

    pub fn cell<T: Send + Sync + 'static>(&mut self, value: T) -> CellId<T> {
        self.add_cell(value, None, UpdatePolicy::Lazy)
    }

    pub fn cell_with_key<T: Send + Sync + 'static>(
        &mut self,
        value: T,
        key: impl Into<String>,
    ) -> CellId<T> {
        self.add_cell(value, Some(key.into()), UpdatePolicy::Lazy)
    }

    /// A cell whose writes rebuild every dependent immediately.
    pub fn auto_cell<T: Send + Sync + 'static>(&mut self, value: T) -> CellId<T> {
        self.add_cell(value, None, UpdatePolicy::Eager)
    }

    pub fn add_cell<T: Send + Sync + 'static>(
        &mut self,
        value: T,
        key: Option<String>,
        policy: UpdatePolicy,
    ) -> CellId<T> {
        let key = key.unwrap_or_else(|| self.keys.next_key());
        let id = NodeId(self.nodes.len());
        trace!(%id, key = %key, ?policy, "adding cell");
        self.nodes.push(Node::Cell(CellNode {
            key,
            value: Value::new(value),
            parents: Vec::new(),
            policy,
            revision: 0,
        }));
        CellId::new(id)
    }

    /// Write a new value into a cell and propagate it.
    ///
    /// Returns `false`, and does nothing, when `value` equals the current one.
    pub fn set<T>(&mut self, cell: CellId<T>, value: T) -> Result<bool, GraphError>
    where
        T: PartialEq + Send + Sync + 'static,
    {
        let unchanged = self
            .cell_node(cell.node())
            .value
            .downcast_ref::<T>()
            .is_some_and(|current| *current == value);
        if unchanged {
            trace!(key = %self.key(cell), "value unchanged; skipping update");
            return Ok(false);
        }

        self.replace(cell, value);
        self.update(cell)?;
        Ok(true)
    }

    /// Store a new cell value without notifying dependents.
    pub(crate) fn replace<T: Send + Sync + 'static>(&mut self, cell: CellId<T>, value: T) {
        let node = self.cell_node_mut(cell.node());
        node.value = Value::new(value);
        node.revision += 1;
    }

    pub fn revision<T>(&self, cell: CellId<T>) -> u64 {
        self.cell_node(cell.node()).revision
    }

    // ---------------------------------------------------------------------
    // Computables
    // ---------------------------------------------------------------------

    pub fn computable<T, F>(&mut self, children: &[NodeId], build: F) -> ComputableId<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&Inputs<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.add_computable(children, None, UpdatePolicy::Lazy, build)
    }

    pub fn computable_with_key<T, F>(
        &mut self,
        children: &[NodeId],
        key: impl Into<String>,
        build: F,
    ) -> ComputableId<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&Inputs<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.add_computable(children, Some(key.into()), UpdatePolicy::Lazy, build)
    }

    /// A computable that, when its own update is triggered, rebuilds itself
    /// and everything that depends on it.
    pub fn auto_computable<T, F>(&mut self, children: &[NodeId], build: F) -> ComputableId<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&Inputs<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.add_computable(children, None, UpdatePolicy::Eager, build)
    }

    pub fn add_computable<T, F>(
        &mut self,
        children: &[NodeId],
        key: Option<String>,
        policy: UpdatePolicy,
        build: F,
    ) -> ComputableId<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&Inputs<'_>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let build: Builder = Arc::new(move |inputs: &Inputs<'_>| build(inputs).map(Value::new));
        ComputableId::new(self.add_computable_node(children, key, policy, build, false))
    }

    /// Derive a value from a single node.
    pub fn map<A, B, H, F>(&mut self, node: H, f: F) -> ComputableId<B>
    where
        H: Handle<A>,
        A: Send + Sync + 'static,
        B: Send + Sync + 'static,
        F: Fn(&A) -> B + Send + Sync + 'static,
    {
        self.computable(&[node.into()], move |inputs| {
            let value = inputs.get::<A>(0)?;
            Ok(f(value.as_ref()))
        })
    }

    pub(crate) fn add_computable_node(
        &mut self,
        children: &[NodeId],
        key: Option<String>,
        policy: UpdatePolicy,
        build: Builder,
        rebuild_when_stale: bool,
    ) -> NodeId {
        let key = key.unwrap_or_else(|| self.keys.next_key());
        let id = NodeId(self.nodes.len());
        for &child in children {
            self.node_mut(child).parents_mut().push(id);
        }
        trace!(%id, key = %key, children = children.len(), ?policy, "adding computable");
        self.nodes.push(Node::Computable(ComputableNode {
            key,
            children: children.to_vec(),
            build,
            should_rebuild: true,
            value: None,
            parents: Vec::new(),
            policy,
            rebuild_when_stale,
        }));
        id
    }

    /// Append children to an existing computable and trigger its update.
    pub fn add_children<T>(
        &mut self,
        computable: ComputableId<T>,
        children: &[NodeId],
    ) -> Result<(), GraphError> {
        let id = computable.node();
        for &child in children {
            self.node_mut(child).parents_mut().push(id);
        }
        self.computable_node_mut(id).children.extend_from_slice(children);
        self.update(id)
    }

    pub fn get<T: Send + Sync + 'static>(&self, node: impl Handle<T>) -> Option<Arc<T>> {
        self.node(node).value().and_then(Value::downcast::<T>)
    }

    pub fn value<T: Clone + Send + Sync + 'static>(&self, node: impl Handle<T>) -> Option<T> {
        self.get(node).map(|value| (*value).clone())
    }

    pub fn should_rebuild<T>(&self, node: ComputableId<T>) -> bool {
        self.node(node).is_stale()
    }

    // ---------------------------------------------------------------------
    // Migration
    // ---------------------------------------------------------------------

    /// Move every parent edge of `from` onto `to`.
    ///
    /// Each parent's child list has the old cell replaced in place, so child
    /// order is preserved. Nothing is invalidated; `to` is expected to hold
    /// the same value `from` did. `from` is left without parents.
    pub fn migrate<T>(&mut self, from: CellId<T>, to: CellId<T>) -> Result<(), GraphError> {
        let (from, to) = (from.node(), to.node());
        let parents = self.node(from).parents().to_vec();

        // Check every edge before touching any of them.
        for &parent in &parents {
            if !self.children(parent).contains(&from) {
                return Err(GraphError::MissingEdge {
                    parent: self.key(parent).to_string(),
                    child: self.key(from).to_string(),
                });
            }
        }

        for &parent in &parents {
            let children = &mut self.computable_node_mut(parent).children;
            if let Some(slot) = children.iter_mut().find(|child| **child == from) {
                *slot = to;
            }
        }
        self.node_mut(from).parents_mut().clear();
        self.node_mut(to).parents_mut().extend(parents.iter().copied());

        debug!(
            from = %self.key(from),
            to = %self.key(to),
            parents = parents.len(),
            "migrated cell edges"
        );
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    fn cell_node(&self, id: NodeId) -> &CellNode {
        match self.node(id) {
            Node::Cell(cell) => cell,
            Node::Computable(computable) => {
                panic!("node {id} ('{}') is not a cell", computable.key)
            }
        }
    }

    fn cell_node_mut(&mut self, id: NodeId) -> &mut CellNode {
        match self.node_mut(id) {
            Node::Cell(cell) => cell,
            Node::Computable(computable) => {
                panic!("node {id} ('{}') is not a cell", computable.key)
            }
        }
    }

    pub(crate) fn computable_node_mut(&mut self, id: NodeId) -> &mut ComputableNode {
        match self.node_mut(id) {
            Node::Computable(computable) => computable,
            Node::Cell(cell) => panic!("node {id} ('{}') is not a computable", cell.key),
        }
    }
}
