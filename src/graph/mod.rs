// src/graph/mod.rs

//! Dependency graph of cells and computables.
//!
//! Cells are mutable leaves. Computables derive a value from an ordered list
//! of children and memoize it until one of those children changes. Nodes live
//! in an arena owned by [`Graph`] and are addressed by [`NodeId`]; the typed
//! handles [`CellId`] and [`ComputableId`] remember what value a node holds.
//!
//! Writes propagate according to each node's [`UpdatePolicy`]: lazily, by
//! marking dependents stale, or eagerly, by rebuilding them on the spot.

mod arena;
mod compute;
mod keys;
mod node;
mod roots;
mod shared;
mod update;

pub use arena::Graph;
pub use keys::{KeyGenerator, SequentialKeys};
pub use node::{
    CellId, CellNode, ComputableId, ComputableNode, Handle, Inputs, Node, NodeId, Snapshot,
};
pub use shared::SharedGraph;

pub use crate::types::UpdatePolicy;

pub(crate) use node::{Builder, Settled, Value};
