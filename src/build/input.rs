// src/build/input.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::channel::Channel;
use crate::errors::WatchError;
use crate::fs::{FileSystem, RealFileSystem};
use crate::graph::{CellId, NodeId, SharedGraph};
use crate::types::UpdatePolicy;
use crate::watch::{watch_events, ChangeSource, Digest, EventStream, Message, NotifySource};

use super::{checked_path, path_key, read_digest, FileCell};

/// Window within which repeated changes to one input are ignored.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// How an [`Input`] watches its file.
#[derive(Clone)]
pub struct InputOptions {
    pub policy: UpdatePolicy,
    pub debounce: Duration,
    /// Receives a [`Message`] after every successful re-digest.
    pub notifications: Option<Channel<Message>>,
    pub source: Arc<dyn ChangeSource>,
    pub fs: Arc<dyn FileSystem>,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            policy: UpdatePolicy::Lazy,
            debounce: DEFAULT_DEBOUNCE,
            notifications: None,
            source: Arc::new(NotifySource),
            fs: Arc::new(RealFileSystem),
        }
    }
}

impl InputOptions {
    pub fn eager(mut self) -> Self {
        self.policy = UpdatePolicy::Eager;
        self
    }

    pub fn with_policy(mut self, policy: UpdatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_notifications(mut self, channel: Channel<Message>) -> Self {
        self.notifications = Some(channel);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn ChangeSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }
}

impl fmt::Debug for InputOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputOptions")
            .field("policy", &self.policy)
            .field("debounce", &self.debounce)
            .field("notifications", &self.notifications.is_some())
            .field("source", &self.source)
            .field("fs", &self.fs)
            .finish()
    }
}

/// A cell holding the digest of a watched file.
///
/// Every debounced change re-reads the file and writes the new digest into
/// the cell, which propagates to dependents according to the cell's policy.
/// The watch runs until [`close`](Input::close) is called or the input is
/// dropped.
pub struct Input {
    id: CellId<Digest>,
    path: PathBuf,
    notifications: Option<Channel<Message>>,
    token: CancellationToken,
    watcher: Option<JoinHandle<Result<(), WatchError>>>,
}

impl Input {
    /// Digest `path` and start watching it.
    pub async fn of(
        graph: &SharedGraph,
        path: impl Into<PathBuf>,
        options: InputOptions,
    ) -> Result<Self, WatchError> {
        let path = checked_path(path.into())?;
        let digest = read_digest(Arc::clone(&options.fs), path.clone()).await?;
        let id = graph
            .lock()
            .add_cell(digest, Some(path_key(&path)), options.policy);
        Self::start(graph, id, path, options)
    }

    /// An input whose changes rebuild every dependent immediately.
    pub async fn auto(
        graph: &SharedGraph,
        path: impl Into<PathBuf>,
        options: InputOptions,
    ) -> Result<Self, WatchError> {
        Self::of(graph, path, options.eager()).await
    }

    /// Upgrade an unwatched [`FileCell`] in place.
    ///
    /// Every computable that depended on `file` depends on the new input
    /// instead, at the same child position. The digest is carried over, so
    /// nothing is invalidated by the swap.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from(
        graph: &SharedGraph,
        file: &FileCell,
        options: InputOptions,
    ) -> Result<Self, WatchError> {
        let id = {
            let mut graph = graph.lock();
            let digest = graph
                .value(file.id())
                .ok_or_else(|| anyhow::anyhow!("{:?} holds no digest", file.path()))?;
            let key = graph.key(file.id()).to_string();
            let id = graph.add_cell(digest, Some(key), options.policy);
            graph.migrate(file.id(), id)?;
            id
        };
        Self::start(graph, id, file.path().to_path_buf(), options)
    }

    fn start(
        graph: &SharedGraph,
        id: CellId<Digest>,
        path: PathBuf,
        options: InputOptions,
    ) -> Result<Self, WatchError> {
        // Subscribe before returning so no change after construction is missed.
        let events = options.source.subscribe(&path)?;
        let token = CancellationToken::new();
        let watcher = tokio::spawn(refresh_on_change(
            graph.clone(),
            id,
            path.clone(),
            events,
            token.clone(),
            options.clone(),
        ));
        info!(?path, policy = ?options.policy, "watching input");

        Ok(Self {
            id,
            path,
            notifications: options.notifications,
            token,
            watcher: Some(watcher),
        })
    }

    pub fn id(&self) -> CellId<Digest> {
        self.id
    }

    pub fn node(&self) -> NodeId {
        self.id.node()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn notifications(&self) -> Option<&Channel<Message>> {
        self.notifications.as_ref()
    }

    pub fn is_watching(&self) -> bool {
        self.watcher
            .as_ref()
            .is_some_and(|watcher| !watcher.is_finished())
    }

    /// Stop watching and wait for the watch task to end.
    ///
    /// A change being processed when this is called is finished first. Any
    /// error that ended the watch early is returned here.
    pub async fn close(&mut self) -> Result<(), WatchError> {
        self.token.cancel();
        match self.watcher.take() {
            Some(watcher) => watcher.await?,
            None => Ok(()),
        }
    }
}

impl Drop for Input {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("watching", &self.is_watching())
            .finish()
    }
}

async fn refresh_on_change(
    graph: SharedGraph,
    id: CellId<Digest>,
    path: PathBuf,
    events: EventStream,
    token: CancellationToken,
    options: InputOptions,
) -> Result<(), WatchError> {
    let InputOptions {
        debounce,
        notifications,
        fs,
        ..
    } = options;

    watch_events(&path, events, token, debounce, |event| {
        let graph = graph.clone();
        let fs = Arc::clone(&fs);
        let path = path.clone();
        let notifications = notifications.clone();
        async move {
            let digest = read_digest(fs, path.clone()).await?;
            let changed = graph.lock().set(id, digest)?;
            debug!(?path, changed, "re-digested input");
            if let Some(channel) = notifications {
                channel.send(Message {
                    filename: path,
                    event,
                });
            }
            Ok(())
        }
    })
    .await
}
