// src/build/target.rs

use std::fmt;
use std::future::Future;

use crate::asynchronous::Pending;
use crate::errors::{AsyncError, GraphError};
use crate::graph::{ComputableId, NodeId, SharedGraph, Snapshot};
use crate::types::UpdatePolicy;
use crate::watch::Digest;

/// An asynchronous build step producing a digest.
///
/// A plain target is lazy: it is marked stale when an input changes and
/// rebuilt by [`compute`](Target::compute). An output target additionally
/// rebuilds itself as soon as it goes stale, for as long as nothing depends
/// on it.
#[derive(Clone)]
pub struct Target {
    graph: SharedGraph,
    id: ComputableId<Pending<Digest>>,
}

impl Target {
    pub fn new<F, Fut>(
        graph: &SharedGraph,
        children: &[NodeId],
        key: Option<String>,
        build: F,
    ) -> Self
    where
        F: Fn(Snapshot) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Digest>> + Send + 'static,
    {
        let id = graph
            .lock()
            .async_computable(children, key, UpdatePolicy::Lazy, build);
        Self {
            graph: graph.clone(),
            id,
        }
    }

    /// A target that keeps itself up to date. The first build starts here.
    pub fn output<F, Fut>(
        graph: &SharedGraph,
        children: &[NodeId],
        key: Option<String>,
        build: F,
    ) -> Result<Self, GraphError>
    where
        F: Fn(Snapshot) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Digest>> + Send + 'static,
    {
        let id = {
            let mut graph = graph.lock();
            let id = graph.async_output(children, key, UpdatePolicy::Lazy, build);
            graph.compute(id)?
        };
        Ok(Self {
            graph: graph.clone(),
            id,
        })
    }

    pub fn id(&self) -> ComputableId<Pending<Digest>> {
        self.id
    }

    pub fn node(&self) -> NodeId {
        self.id.node()
    }

    pub fn key(&self) -> String {
        self.graph.lock().key(self.id).to_string()
    }

    pub fn should_rebuild(&self) -> bool {
        self.graph.lock().should_rebuild(self.id)
    }

    /// Rebuild this target and whatever is stale below it.
    pub fn compute(&self) -> Result<&Self, GraphError> {
        self.graph.lock().compute(self.id)?;
        Ok(self)
    }

    /// The future from the most recent build, if there was one.
    pub fn value(&self) -> Option<Pending<Digest>> {
        self.graph.lock().value(self.id)
    }

    /// Wait for the most recent build and return its digest.
    pub async fn digest(&self) -> Result<Digest, AsyncError> {
        let pending = self.value().ok_or_else(|| {
            AsyncError::new(anyhow::anyhow!("target '{}' has not been built", self.key()))
        })?;
        pending.await
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target").field("id", &self.id).finish()
    }
}
