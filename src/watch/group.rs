// src/watch/group.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use notify::Event;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::channel::Channel;
use crate::errors::WatchError;
use crate::watch::source::ChangeSource;
use crate::watch::watcher::watch_events;
use crate::watch::Message;

/// Called for every change seen by a [`WatchGroup`] before it is published.
pub type WatchCallback =
    Arc<dyn Fn(PathBuf, Event) -> BoxFuture<'static, Result<(), WatchError>> + Send + Sync>;

/// One watched path and the channel its changes are published on.
#[derive(Debug, Clone)]
pub struct WatchedPath {
    pub filename: PathBuf,
    pub channel: Channel<Message>,
}

/// A set of paths watched together and stopped together.
pub struct WatchGroup {
    watched: Vec<WatchedPath>,
    token: CancellationToken,
    source: Arc<dyn ChangeSource>,
    delay: Duration,
    callback: Option<WatchCallback>,
    tasks: Vec<JoinHandle<Result<(), WatchError>>>,
}

impl WatchGroup {
    /// Cancelling `token` stops every watch of the group.
    pub fn new(token: &CancellationToken, source: Arc<dyn ChangeSource>, delay: Duration) -> Self {
        Self {
            watched: Vec::new(),
            token: token.child_token(),
            source,
            delay,
            callback: None,
            tasks: Vec::new(),
        }
    }

    pub fn with_callback(mut self, callback: WatchCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Add a path to the group. Returns `false` if it was already present.
    pub fn add(&mut self, filename: impl Into<PathBuf>) -> bool {
        let filename = filename.into();
        if self.watched.iter().any(|w| w.filename == filename) {
            return false;
        }
        self.watched.push(WatchedPath {
            filename,
            channel: Channel::new(),
        });
        true
    }

    pub fn watched(&self) -> &[WatchedPath] {
        &self.watched
    }

    pub fn channel(&self, filename: &Path) -> Option<&Channel<Message>> {
        self.watched
            .iter()
            .find(|w| w.filename == filename)
            .map(|w| &w.channel)
    }

    /// Start watching every path added since the last call.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&mut self) -> Result<(), WatchError> {
        for watched in &self.watched[self.tasks.len()..] {
            let events = self.source.subscribe(&watched.filename)?;
            let filename = watched.filename.clone();
            let channel = watched.channel.clone();
            let callback = self.callback.clone();
            let token = self.token.clone();
            let delay = self.delay;

            self.tasks.push(tokio::spawn(async move {
                let path = filename.clone();
                watch_events(&path, events, token, delay, |event| {
                    let filename = filename.clone();
                    let channel = channel.clone();
                    let callback = callback.clone();
                    async move {
                        if let Some(callback) = callback {
                            callback(filename.clone(), event.clone()).await?;
                        }
                        channel.send(Message { filename, event });
                        Ok(())
                    }
                })
                .await
            }));
        }
        info!(paths = self.tasks.len(), "watch group open");
        Ok(())
    }

    /// Stop every watch and wait for them to finish.
    ///
    /// Every watch is awaited even if an earlier one failed; the first
    /// failure is returned.
    pub async fn close(&mut self) -> Result<(), WatchError> {
        self.token.cancel();
        let mut first_error = None;
        for task in self.tasks.drain(..) {
            let result = match task.await {
                Ok(result) => result,
                Err(join_err) => Err(WatchError::from(join_err)),
            };
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }
        for watched in &self.watched {
            watched.channel.close();
        }
        debug!("watch group closed");
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for WatchGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchGroup")
            .field("watched", &self.watched)
            .field("running", &self.tasks.len())
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}
