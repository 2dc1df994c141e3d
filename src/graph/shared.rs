// src/graph/shared.rs

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::Graph;

/// A [`Graph`] shared between tasks.
///
/// The lock is only ever held for synchronous graph operations. Guards must
/// not be held across an `.await`.
#[derive(Clone, Default)]
pub struct SharedGraph {
    inner: Arc<Mutex<Graph>>,
}

impl SharedGraph {
    pub fn new(graph: Graph) -> Self {
        Self {
            inner: Arc::new(Mutex::new(graph)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Graph> {
        // A panicking build function leaves the arena structurally intact.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<Graph> for SharedGraph {
    fn from(graph: Graph) -> Self {
        Self::new(graph)
    }
}

impl fmt::Debug for SharedGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedGraph")
            .field("nodes", &self.lock().len())
            .finish()
    }
}
