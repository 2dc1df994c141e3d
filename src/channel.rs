// src/channel.rs

//! In-process FIFO of messages with close semantics.
//!
//! Messages sent while a receiver is waiting go straight to the longest
//! waiting receiver; otherwise they are buffered. After [`Channel::close`]
//! no new messages are accepted, buffered ones can still be drained, and
//! every waiting receiver wakes up with `None`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::oneshot;
use tracing::trace;

struct State<T> {
    queue: VecDeque<T>,
    waiters: VecDeque<oneshot::Sender<Option<T>>>,
    running: bool,
}

/// Cloneable handle to a shared message queue.
pub struct Channel<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                queue: VecDeque::new(),
                waiters: VecDeque::new(),
                running: true,
            })),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Channel")
            .field("buffered", &state.queue.len())
            .field("waiting", &state.waiters.len())
            .field("running", &state.running)
            .finish()
    }
}

impl<T: Send + 'static> Channel<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `message` to a waiting receiver, or buffer it.
    ///
    /// Returns `false` if the channel is closed; the message is dropped.
    pub fn send(&self, message: T) -> bool {
        let mut state = self.lock();
        if !state.running {
            trace!("send on closed channel");
            return false;
        }

        let mut message = message;
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(Some(message)) {
                Ok(()) => return true,
                // The receiver gave up waiting; try the next one.
                Err(Some(returned)) => message = returned,
                Err(None) => return true,
            }
        }
        state.queue.push_back(message);
        true
    }

    /// Next message, or `None` once the channel is closed and drained.
    pub async fn recv(&self) -> Option<T> {
        let waiter = {
            let mut state = self.lock();
            if let Some(message) = state.queue.pop_front() {
                return Some(message);
            }
            if !state.running {
                return None;
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };
        waiter.await.ok().flatten()
    }

    /// Every message in order, ending when the channel is closed and drained.
    pub fn receive(&self) -> BoxStream<'static, T> {
        stream::unfold(self.clone(), |channel| async move {
            let message = channel.recv().await?;
            Some((message, channel))
        })
        .boxed()
    }

    pub fn close(&self) {
        let waiters = {
            let mut state = self.lock();
            if !state.running {
                return;
            }
            state.running = false;
            std::mem::take(&mut state.waiters)
        };
        trace!(woken = waiters.len(), "closing channel");
        for waiter in waiters {
            let _ = waiter.send(None);
        }
    }
}

impl<T> Channel<T> {
    pub fn is_closed(&self) -> bool {
        !self.lock().running
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
