// src/asynchronous/computable.rs

use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};

use super::pending::Pending;
use crate::graph::{Builder, ComputableId, Graph, Inputs, NodeId, Snapshot, Value};
use crate::types::UpdatePolicy;

impl Graph {
    /// A computable whose build function returns a future.
    ///
    /// The function receives an owned [`Snapshot`] of its children, so the
    /// future never borrows the graph. Awaiting a child that is itself
    /// asynchronous is done through [`Snapshot::pending`].
    pub fn async_computable<T, F, Fut>(
        &mut self,
        children: &[NodeId],
        key: Option<String>,
        policy: UpdatePolicy,
        build: F,
    ) -> ComputableId<Pending<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Snapshot) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        ComputableId::new(self.add_computable_node(
            children,
            key,
            policy,
            pending_builder(build),
            false,
        ))
    }

    /// Like [`async_computable`](Self::async_computable), but the node
    /// rebuilds itself whenever it is invalidated while nothing depends on it.
    pub(crate) fn async_output<T, F, Fut>(
        &mut self,
        children: &[NodeId],
        key: Option<String>,
        policy: UpdatePolicy,
        build: F,
    ) -> ComputableId<Pending<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(Snapshot) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        ComputableId::new(self.add_computable_node(
            children,
            key,
            policy,
            pending_builder(build),
            true,
        ))
    }

    /// Resolves once the future currently stored in `node` has finished.
    /// Synchronous and not yet computed nodes are settled immediately.
    pub fn settled(&self, node: impl Into<NodeId>) -> BoxFuture<'static, ()> {
        match self.node(node).value().and_then(Value::settled) {
            Some(settled) => settled.boxed(),
            None => future::ready(()).boxed(),
        }
    }
}

fn pending_builder<T, F, Fut>(build: F) -> Builder
where
    T: Clone + Send + Sync + 'static,
    F: Fn(Snapshot) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Arc::new(move |inputs: &Inputs<'_>| {
        let pending = Pending::new(build(inputs.snapshot()));
        let settled = pending.settled();
        Ok(Value::with_settled(pending, settled))
    })
}
