// src/watch/watcher.rs

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use notify::Event;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::errors::WatchError;
use crate::watch::debounce::Debouncer;
use crate::watch::source::{is_change, ChangeSource, EventStream};

/// Watch `path` until `token` is cancelled, calling `on_change` for each
/// debounced change.
pub async fn watch<F, Fut>(
    source: &dyn ChangeSource,
    path: &Path,
    token: CancellationToken,
    delay: Duration,
    on_change: F,
) -> Result<(), WatchError>
where
    F: FnMut(Event) -> Fut,
    Fut: Future<Output = Result<(), WatchError>>,
{
    let events = source.subscribe(path)?;
    watch_events(path, events, token, delay, on_change).await
}

/// Drive an already subscribed event stream.
///
/// - Only creation, modification and removal events are considered; the
///   first one passes and later ones pass once `delay` has elapsed since the
///   last one that did.
/// - `on_change` runs to completion before the next event is looked at.
/// - Cancellation ends the loop with `Ok(())`, as does the stream ending.
/// - Errors from the stream or from `on_change` end the loop and are
///   returned; they are never debounced.
pub async fn watch_events<F, Fut>(
    path: &Path,
    mut events: EventStream,
    token: CancellationToken,
    delay: Duration,
    mut on_change: F,
) -> Result<(), WatchError>
where
    F: FnMut(Event) -> Fut,
    Fut: Future<Output = Result<(), WatchError>>,
{
    debug!(?path, ?delay, "watching for changes");
    let mut debouncer = Debouncer::new(delay);

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(?path, "watch cancelled");
                return Ok(());
            }
            next = events.next() => next,
        };

        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(err)) => return Err(err),
            None => {
                debug!(?path, "change source closed");
                return Ok(());
            }
        };

        if !is_change(&event) {
            trace!(?event, "ignoring event");
            continue;
        }
        if !debouncer.admit() {
            trace!(?path, "debounced change");
            continue;
        }

        debug!(?path, kind = ?event.kind, "change detected");
        on_change(event).await?;
    }
}
