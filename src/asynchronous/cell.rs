// src/asynchronous/cell.rs

use std::fmt;
use std::future::IntoFuture;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{self, BoxFuture};
use tracing::trace;

use super::pending::{AsyncResult, Pending};
use crate::errors::AsyncError;
use crate::graph::{CellId, SharedGraph};
use crate::types::UpdatePolicy;

/// A cell written with futures.
///
/// Each write waits for the write before it, then compares the two resolved
/// values. When the write before it failed, the value stored in the slot is
/// used instead. Only a value that differs from its predecessor replaces the cell
/// content and propagates to dependents, so a burst of writes that settles on
/// the value already stored costs no rebuild.
///
/// The graph slot always holds an already resolved value; the chain of
/// in-flight writes lives next to it. A dependent reading the slot therefore
/// never waits on the write that triggered its own rebuild.
pub struct AsyncCell<T> {
    graph: SharedGraph,
    id: CellId<Pending<T>>,
    head: Arc<Mutex<Pending<T>>>,
}

impl<T> Clone for AsyncCell<T> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            id: self.id,
            head: Arc::clone(&self.head),
        }
    }
}

impl<T> AsyncCell<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(graph: &SharedGraph, initial: Pending<T>) -> Self {
        Self::with_options(graph, initial, None, UpdatePolicy::Lazy)
    }

    /// A cell holding an already known value.
    pub fn resolved(graph: &SharedGraph, value: T) -> Self {
        Self::new(graph, Pending::ready(value))
    }

    /// A cell whose writes complete only after every root above it has been
    /// rebuilt and has settled.
    pub fn auto(graph: &SharedGraph, initial: Pending<T>) -> Self {
        Self::with_options(graph, initial, None, UpdatePolicy::Eager)
    }

    pub fn with_options(
        graph: &SharedGraph,
        initial: Pending<T>,
        key: Option<String>,
        policy: UpdatePolicy,
    ) -> Self {
        let id = graph.lock().add_cell(initial.clone(), key, policy);
        Self {
            graph: graph.clone(),
            id,
            head: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn id(&self) -> CellId<Pending<T>> {
        self.id
    }

    /// The latest write, resolving once it and every write before it have
    /// been applied.
    pub fn value(&self) -> Pending<T> {
        self.head().clone()
    }

    /// Queue a write. Awaiting the returned future (or [`value`](Self::value))
    /// waits for the write to be applied.
    pub fn set(&self, next: Pending<T>) -> Pending<T> {
        let mut head = self.head();
        let previous = head.clone();
        let graph = self.graph.clone();
        let id = self.id;

        let chained = Pending::from_result(async move {
            let (previous, next) =
                future::join(previous.into_future(), next.into_future()).await;
            let next = next?;
            // A failed write never reached the slot; compare against what did.
            let current = match previous {
                Ok(previous) => Some(previous),
                Err(_) => match slot(&graph, id) {
                    Some(stored) => stored.await.ok(),
                    None => None,
                },
            };
            if current.as_ref() == Some(&next) {
                trace!("async write resolved to the current value");
            } else {
                adopt(&graph, id, next.clone()).await?;
            }
            Ok(next)
        });
        *head = chained.clone();
        chained
    }

    fn head(&self) -> MutexGuard<'_, Pending<T>> {
        self.head.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn slot<T>(graph: &SharedGraph, id: CellId<Pending<T>>) -> Option<Pending<T>>
where
    T: Clone + Send + Sync + 'static,
{
    graph.lock().value(id)
}

/// Store a resolved value in the slot and propagate it. Eager cells also wait
/// for every root above them to settle.
async fn adopt<T>(graph: &SharedGraph, id: CellId<Pending<T>>, value: T) -> AsyncResult<()>
where
    T: Clone + Send + Sync + 'static,
{
    let waits: Vec<BoxFuture<'static, ()>> = {
        let mut graph = graph.lock();
        graph.replace(id, Pending::ready(value));
        graph.update(id).map_err(AsyncError::from)?;
        if graph.node(id).policy() == UpdatePolicy::Eager {
            graph
                .roots(id)
                .into_iter()
                .map(|root| graph.settled(root))
                .collect()
        } else {
            Vec::new()
        }
    };
    future::join_all(waits).await;
    Ok(())
}

impl<T> fmt::Debug for AsyncCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCell").field("id", &self.id).finish()
    }
}
