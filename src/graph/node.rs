// src/graph/node.rs

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};

use super::Graph;
use crate::errors::GraphError;
use crate::types::UpdatePolicy;

/// Index of a node inside its [`Graph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A typed node reference: something whose value is a `T`.
pub trait Handle<T>: Copy + Into<NodeId> {}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name<T> {
            id: NodeId,
            _marker: PhantomData<fn() -> T>,
        }

        impl<T> $name<T> {
            pub(crate) fn new(id: NodeId) -> Self {
                Self {
                    id,
                    _marker: PhantomData,
                }
            }

            pub fn node(self) -> NodeId {
                self.id
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> Hash for $name<T> {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.id)
            }
        }

        impl<T> From<$name<T>> for NodeId {
            fn from(handle: $name<T>) -> NodeId {
                handle.id
            }
        }

        impl<T> Handle<T> for $name<T> {}
    };
}

typed_handle!(
    /// Handle to a mutable leaf holding a `T`.
    CellId
);

typed_handle!(
    /// Handle to a derived node producing a `T`.
    ComputableId
);

/// Resolves once the asynchronous work behind a value has finished.
pub(crate) type Settled = Shared<BoxFuture<'static, ()>>;

/// Type-erased node value.
#[derive(Clone)]
pub(crate) struct Value {
    data: Arc<dyn Any + Send + Sync>,
    settled: Option<Settled>,
}

impl Value {
    pub(crate) fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            data: Arc::new(value),
            settled: None,
        }
    }

    pub(crate) fn with_settled<T: Send + Sync + 'static>(value: T, settled: Settled) -> Self {
        Self {
            data: Arc::new(value),
            settled: Some(settled),
        }
    }

    pub(crate) fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.data).downcast::<T>().ok()
    }

    pub(crate) fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        (*self.data).downcast_ref::<T>()
    }

    pub(crate) fn settled(&self) -> Option<Settled> {
        self.settled.clone()
    }
}

pub(crate) type Builder = Arc<dyn Fn(&Inputs<'_>) -> anyhow::Result<Value> + Send + Sync>;

/// A node in the graph. Consumers inspect nodes by matching on the variant.
#[derive(Debug)]
pub enum Node {
    Cell(CellNode),
    Computable(ComputableNode),
}

impl Node {
    pub fn key(&self) -> &str {
        match self {
            Node::Cell(cell) => &cell.key,
            Node::Computable(computable) => &computable.key,
        }
    }

    pub fn parents(&self) -> &[NodeId] {
        match self {
            Node::Cell(cell) => &cell.parents,
            Node::Computable(computable) => &computable.parents,
        }
    }

    pub(crate) fn parents_mut(&mut self) -> &mut Vec<NodeId> {
        match self {
            Node::Cell(cell) => &mut cell.parents,
            Node::Computable(computable) => &mut computable.parents,
        }
    }

    /// Children of a computable; cells have none.
    pub fn children(&self) -> &[NodeId] {
        match self {
            Node::Cell(_) => &[],
            Node::Computable(computable) => &computable.children,
        }
    }

    pub fn policy(&self) -> UpdatePolicy {
        match self {
            Node::Cell(cell) => cell.policy,
            Node::Computable(computable) => computable.policy,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Node::Computable(computable) if computable.should_rebuild)
    }

    pub(crate) fn value(&self) -> Option<&Value> {
        match self {
            Node::Cell(cell) => Some(&cell.value),
            Node::Computable(computable) => computable.value.as_ref(),
        }
    }
}

pub struct CellNode {
    pub(crate) key: String,
    pub(crate) value: Value,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) policy: UpdatePolicy,
    pub(crate) revision: u64,
}

impl CellNode {
    /// Number of times the stored value has been replaced.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl fmt::Debug for CellNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellNode")
            .field("key", &self.key)
            .field("parents", &self.parents)
            .field("policy", &self.policy)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

pub struct ComputableNode {
    pub(crate) key: String,
    pub(crate) children: Vec<NodeId>,
    pub(crate) build: Builder,
    pub(crate) should_rebuild: bool,
    pub(crate) value: Option<Value>,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) policy: UpdatePolicy,
    /// Rebuild on invalidation when nothing depends on this node.
    pub(crate) rebuild_when_stale: bool,
}

impl ComputableNode {
    pub fn should_rebuild(&self) -> bool {
        self.should_rebuild
    }

    pub fn is_computed(&self) -> bool {
        self.value.is_some()
    }

    pub fn rebuilds_when_stale(&self) -> bool {
        self.rebuild_when_stale
    }
}

impl fmt::Debug for ComputableNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputableNode")
            .field("key", &self.key)
            .field("children", &self.children)
            .field("parents", &self.parents)
            .field("should_rebuild", &self.should_rebuild)
            .field("computed", &self.value.is_some())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Borrowed view of a computable's children, handed to its build function.
pub struct Inputs<'g> {
    graph: &'g Graph,
    owner: NodeId,
    children: &'g [NodeId],
}

impl<'g> Inputs<'g> {
    pub(crate) fn new(graph: &'g Graph, owner: NodeId, children: &'g [NodeId]) -> Self {
        Self {
            graph,
            owner,
            children,
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn key(&self, index: usize) -> Option<&'g str> {
        let graph = self.graph;
        self.children.get(index).map(|&id| graph.key(id))
    }

    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>, GraphError> {
        let value = self.children.get(index).map(|&id| self.graph.node(id).value());
        lookup(self.graph.key(self.owner), index, self.len(), value)?
            .downcast::<T>()
            .ok_or_else(|| GraphError::TypeMismatch {
                key: self.graph.key(self.owner).to_string(),
                index,
            })
    }

    pub fn value<T: Clone + Send + Sync + 'static>(&self, index: usize) -> Result<T, GraphError> {
        self.get::<T>(index).map(|value| (*value).clone())
    }

    /// Owned copy of the current child values, for work that outlives the
    /// graph borrow.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            owner: self.graph.key(self.owner).to_string(),
            entries: self
                .children
                .iter()
                .map(|&id| {
                    let node = self.graph.node(id);
                    (node.key().to_string(), node.value().cloned())
                })
                .collect(),
        }
    }
}

/// Owned child values of a computable at the moment it was rebuilt.
#[derive(Clone)]
pub struct Snapshot {
    owner: String,
    entries: Vec<(String, Option<Value>)>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn key(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(key, _)| key.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>, GraphError> {
        let value = self.entries.get(index).map(|(_, value)| value.as_ref());
        lookup(&self.owner, index, self.len(), value)?
            .downcast::<T>()
            .ok_or_else(|| GraphError::TypeMismatch {
                key: self.owner.clone(),
                index,
            })
    }

    pub fn value<T: Clone + Send + Sync + 'static>(&self, index: usize) -> Result<T, GraphError> {
        self.get::<T>(index).map(|value| (*value).clone())
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("owner", &self.owner)
            .field("keys", &self.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn lookup<'v>(
    owner: &str,
    index: usize,
    len: usize,
    value: Option<Option<&'v Value>>,
) -> Result<&'v Value, GraphError> {
    match value {
        None => Err(GraphError::NoSuchInput {
            key: owner.to_string(),
            index,
            len,
        }),
        Some(None) => Err(GraphError::NotComputed {
            key: owner.to_string(),
            index,
        }),
        Some(Some(value)) => Ok(value),
    }
}
