// src/asynchronous/pending.rs

use std::fmt;
use std::future::{Future, IntoFuture};

use futures::future::{self, BoxFuture, FutureExt, Shared};

use crate::errors::{AsyncError, GraphError};
use crate::graph::{Settled, Snapshot};

pub type AsyncResult<T> = Result<T, AsyncError>;

/// A future of a `T` that any number of readers can await.
///
/// Created inside a tokio runtime, the future is also spawned so that it makes
/// progress even when nobody is awaiting it yet.
pub struct Pending<T> {
    inner: Shared<BoxFuture<'static, AsyncResult<T>>>,
}

impl<T> Clone for Pending<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Pending<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn ready(value: T) -> Self {
        Self::from_result(future::ready(Ok(value)))
    }

    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        Self::from_result(future::ready(Err(AsyncError::new(err))))
    }

    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::from_result(future.map(|result| result.map_err(AsyncError::from)))
    }

    pub(crate) fn from_result<F>(future: F) -> Self
    where
        F: Future<Output = AsyncResult<T>> + Send + 'static,
    {
        let pending = Self {
            inner: future.boxed().shared(),
        };
        pending.drive();
        pending
    }

    fn drive(&self) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(self.inner.clone());
        }
    }

    /// The result, if the future has already resolved.
    pub fn peek(&self) -> Option<&AsyncResult<T>> {
        self.inner.peek()
    }

    /// Resolves when the future has, whatever the outcome.
    pub(crate) fn settled(&self) -> Settled {
        self.inner.clone().map(|_| ()).boxed().shared()
    }
}

impl<T: Clone> IntoFuture for Pending<T> {
    type Output = AsyncResult<T>;
    type IntoFuture = Shared<BoxFuture<'static, AsyncResult<T>>>;

    fn into_future(self) -> Self::IntoFuture {
        self.inner
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.inner.peek().is_some() {
            "resolved"
        } else {
            "pending"
        };
        f.debug_tuple("Pending").field(&state).finish()
    }
}

impl Snapshot {
    /// The future held by child `index`.
    pub fn pending<T>(&self, index: usize) -> Result<Pending<T>, GraphError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.value::<Pending<T>>(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_values_resolve() {
        let pending = Pending::ready(7);
        assert_eq!(pending.clone().await.unwrap(), 7);
        assert_eq!(pending.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn failures_are_shared_by_every_reader() {
        let pending: Pending<u8> = Pending::new(async { anyhow::bail!("disk on fire") });
        let first = pending.clone().await.unwrap_err();
        let second = pending.await.unwrap_err();
        assert_eq!(first.to_string(), "disk on fire");
        assert_eq!(second.to_string(), first.to_string());
    }

    #[tokio::test]
    async fn spawned_futures_progress_without_readers() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let pending = Pending::new(async move {
            tx.send(()).ok();
            Ok(1)
        });
        rx.await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(pending.await.unwrap(), 1);
    }
}
