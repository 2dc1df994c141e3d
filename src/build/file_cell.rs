// src/build/file_cell.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::WatchError;
use crate::fs::FileSystem;
use crate::graph::{CellId, NodeId, SharedGraph};
use crate::types::UpdatePolicy;
use crate::watch::Digest;

use super::{checked_path, path_key, read_digest};

/// Digest of a file read once and never refreshed.
///
/// Useful as a placeholder that is later upgraded to a watched
/// [`Input`](super::Input) with `Input::from`.
#[derive(Debug, Clone)]
pub struct FileCell {
    id: CellId<Digest>,
    path: PathBuf,
}

impl FileCell {
    pub async fn of(
        graph: &SharedGraph,
        fs: Arc<dyn FileSystem>,
        path: impl Into<PathBuf>,
    ) -> Result<Self, WatchError> {
        let path = checked_path(path.into())?;
        let digest = read_digest(fs, path.clone()).await?;
        let id = graph
            .lock()
            .add_cell(digest, Some(path_key(&path)), UpdatePolicy::Lazy);
        Ok(Self { id, path })
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
}
