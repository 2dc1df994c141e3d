// src/build/mod.rs

//! File-backed build primitives on top of the graph.
//!
//! - [`Input`] is a cell holding the digest of a watched file, kept current
//!   by a background watch task.
//! - [`FileCell`] is the same digest without a watcher.
//! - [`Target`] is an async computable producing a digest, typically of a
//!   file it writes.

mod file_cell;
mod input;
mod target;

use std::path::PathBuf;
use std::sync::Arc;

pub use file_cell::FileCell;
pub use input::{Input, InputOptions, DEFAULT_DEBOUNCE};
pub use target::Target;

use crate::errors::WatchError;
use crate::fs::FileSystem;
use crate::watch::{digest_file, Digest};

fn checked_path(path: PathBuf) -> Result<PathBuf, WatchError> {
    if path.as_os_str().is_empty() {
        return Err(WatchError::InvalidArgument(
            "cannot watch an empty path".to_string(),
        ));
    }
    Ok(path)
}

fn path_key(path: &std::path::Path) -> String {
    path.display().to_string()
}

/// Digest `path` on the blocking pool.
async fn read_digest(fs: Arc<dyn FileSystem>, path: PathBuf) -> Result<Digest, WatchError> {
    let digest = tokio::task::spawn_blocking(move || digest_file(fs.as_ref(), &path)).await??;
    Ok(digest)
}
