// src/watch/source.rs

use std::fmt::Debug;
use std::path::Path;

use futures::stream::{self, BoxStream, StreamExt};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::WatchError;

/// Raw change notifications for one path.
pub type EventStream = BoxStream<'static, Result<Event, WatchError>>;

/// Something that can report changes to a path.
///
/// `subscribe` registers interest immediately; changes that happen after it
/// returns are reported even if the stream is polled later.
pub trait ChangeSource: Send + Sync + Debug {
    fn subscribe(&self, path: &Path) -> Result<EventStream, WatchError>;
}

/// Native filesystem notifications through `notify`.
#[derive(Debug, Clone, Default)]
pub struct NotifySource;

impl ChangeSource for NotifySource {
    fn subscribe(&self, path: &Path) -> Result<EventStream, WatchError> {
        // Channel from the blocking notify callback into the async world.
        let (event_tx, event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                // The receiver is gone once the stream is dropped.
                let _ = event_tx.send(res);
            },
            Config::default(),
        )?;
        watcher.watch(path, RecursiveMode::NonRecursive)?;
        debug!("file watcher started on {:?}", path);

        // The watcher lives as long as the stream; dropping the stream stops
        // watching.
        let events = stream::unfold((event_rx, watcher), |(mut event_rx, watcher)| async move {
            let next = event_rx.recv().await?;
            Some((next.map_err(WatchError::from), (event_rx, watcher)))
        });
        Ok(events.boxed())
    }
}

/// Whether `event` reports a change to file contents or existence.
pub fn is_change(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind};

    #[test]
    fn only_content_and_existence_changes_count() {
        assert!(is_change(&Event::new(EventKind::Create(CreateKind::File))));
        assert!(is_change(&Event::new(EventKind::Modify(ModifyKind::Data(
            DataChange::Content
        )))));
        assert!(!is_change(&Event::new(EventKind::Access(AccessKind::Read))));
        assert!(!is_change(&Event::new(EventKind::Any)));
    }

    #[test]
    fn subscribing_to_a_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = NotifySource.subscribe(&dir.path().join("missing.txt"));
        assert!(result.is_err());
    }
}
