// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module turns raw filesystem notifications into debounced change
//! callbacks:
//! - [`ChangeSource`] abstracts where notifications come from (`notify` in
//!   production, a scripted source in tests).
//! - [`watch`] / [`watch_events`] run the cancellable, debounced loop.
//! - [`WatchGroup`] watches several paths and publishes each change on a
//!   per-path [`Channel`](crate::channel::Channel).
//!
//! It does **not** know about the dependency graph; the build layer decides
//! what a change means.

pub mod debounce;
pub mod group;
pub mod hash;
pub mod source;
pub mod watcher;

use std::path::PathBuf;

pub use debounce::{debounce, Debouncer};
pub use group::{WatchCallback, WatchGroup, WatchedPath};
pub use hash::{digest_bytes, digest_file, Digest};
pub use source::{is_change, ChangeSource, EventStream, NotifySource};
pub use watcher::{watch, watch_events};

/// A change to a watched file.
#[derive(Debug, Clone)]
pub struct Message {
    pub filename: PathBuf,
    pub event: notify::Event,
}
