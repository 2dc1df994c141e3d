use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use notify::event::{DataChange, ModifyKind};
use notify::{Event, EventKind};
use tokio::sync::mpsc;

use incrbuild::errors::WatchError;
use incrbuild::watch::{ChangeSource, EventStream};

type Subscribers = HashMap<PathBuf, Vec<mpsc::UnboundedSender<Result<Event, WatchError>>>>;

/// A `ChangeSource` driven by the test.
///
/// Every `subscribe` call gets its own stream; `emit`, `fail` and
/// `disconnect` reach every live subscriber of the given path.
#[derive(Debug, Clone, Default)]
pub struct FakeChangeSource {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl FakeChangeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report that `path` was modified.
    pub fn touch(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(path.to_path_buf());
        self.emit(path, event)
    }

    /// Deliver `event` to every subscriber of `path`; returns how many
    /// received it.
    pub fn emit(&self, path: impl AsRef<Path>, event: Event) -> usize {
        self.send(path.as_ref(), || Ok(event.clone()))
    }

    /// Deliver a watch error to every subscriber of `path`.
    pub fn fail(&self, path: impl AsRef<Path>, message: &str) -> usize {
        self.send(path.as_ref(), || {
            Err(WatchError::Other(anyhow::anyhow!(message.to_string())))
        })
    }

    /// End every stream for `path`.
    pub fn disconnect(&self, path: impl AsRef<Path>) {
        self.subscribers.lock().unwrap().remove(path.as_ref());
    }

    /// Number of live subscriptions for `path`.
    pub fn subscribers(&self, path: impl AsRef<Path>) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .get(path.as_ref())
            .map_or(0, |senders| senders.iter().filter(|s| !s.is_closed()).count())
    }

    fn send(&self, path: &Path, mut item: impl FnMut() -> Result<Event, WatchError>) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap();
        let Some(senders) = subscribers.get_mut(path) else {
            return 0;
        };
        senders.retain(|sender| sender.send(item()).is_ok());
        senders.len()
    }
}

impl ChangeSource for FakeChangeSource {
    fn subscribe(&self, path: &Path) -> Result<EventStream, WatchError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap()
            .entry(path.to_path_buf())
            .or_default()
            .push(tx);

        let events = futures::stream::poll_fn(move |cx| rx.poll_recv(cx));
        Ok(events.boxed())
    }
}
