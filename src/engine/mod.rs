// src/engine/mod.rs

//! Manifest-driven build engine.
//!
//! [`BuildEngine`] turns a validated [`Manifest`] into a dependency graph:
//! one watched [`Input`] per distinct input file and one [`Target`] per
//! manifest target, wired in dependency order. [`Runtime`] then keeps the
//! outputs current as inputs change.

mod runtime;

pub use runtime::{Runtime, RuntimeOptions};

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info, warn};

use crate::build::{Input, InputOptions, Target};
use crate::channel::Channel;
use crate::config::Manifest;
use crate::errors::{IncrError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::graph::{NodeId, SharedGraph, Snapshot};
use crate::types::UpdatePolicy;
use crate::watch::{digest_bytes, ChangeSource, Digest, Message, NotifySource};

/// Where the engine reads, writes and watches files.
#[derive(Clone)]
pub struct EngineOptions {
    /// Directory manifest paths are relative to.
    pub root: PathBuf,
    pub source: Arc<dyn ChangeSource>,
    pub fs: Arc<dyn FileSystem>,
}

impl EngineOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            source: Arc::new(NotifySource),
            fs: Arc::new(RealFileSystem),
        }
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

impl fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineOptions")
            .field("root", &self.root)
            .field("source", &self.source)
            .field("fs", &self.fs)
            .finish()
    }
}

pub struct BuildEngine {
    graph: SharedGraph,
    inputs: Vec<Input>,
    /// In manifest dependency order.
    targets: Vec<(String, Target)>,
    notifications: Channel<Message>,
}

impl BuildEngine {
    /// Digest and watch every input file, then create every target.
    ///
    /// With the eager policy, targets nothing depends on are built right
    /// away and rebuild themselves whenever an input changes.
    pub async fn from_manifest(manifest: &Manifest, options: EngineOptions) -> Result<Self> {
        let graph = SharedGraph::default();
        let notifications = Channel::new();
        let policy = manifest.config.update_policy;

        let input_options = InputOptions::default()
            .with_policy(policy)
            .with_debounce(manifest.debounce())
            .with_notifications(notifications.clone())
            .with_source(Arc::clone(&options.source))
            .with_fs(Arc::clone(&options.fs));

        let mut inputs = Vec::new();
        let mut input_nodes: HashMap<&PathBuf, (NodeId, PathBuf)> = HashMap::new();
        for file in manifest.input_files() {
            let path = options.root.join(file);
            let input = Input::of(&graph, path.clone(), input_options.clone()).await?;
            input_nodes.insert(file, (input.node(), path));
            inputs.push(input);
        }

        let mut targets: Vec<(String, Target)> = Vec::new();
        let mut target_nodes: HashMap<&str, (NodeId, PathBuf)> = HashMap::new();
        for name in manifest.order() {
            let config = manifest.target.get(name).ok_or_else(|| {
                IncrError::ConfigError(format!("target '{name}' missing from manifest"))
            })?;

            // Upstream outputs first, then the target's own inputs.
            let (children, sources): (Vec<NodeId>, Vec<PathBuf>) = config
                .after
                .iter()
                .filter_map(|dep| target_nodes.get(dep.as_str()))
                .chain(
                    config
                        .inputs
                        .iter()
                        .filter_map(|file| input_nodes.get(file)),
                )
                .cloned()
                .unzip();

            let output = options.root.join(&config.output);
            let key = Some(output.display().to_string());
            let build = concatenate(Arc::clone(&options.fs), sources, output.clone());
            let target = match policy {
                UpdatePolicy::Lazy => Target::new(&graph, &children, key, build),
                UpdatePolicy::Eager => Target::output(&graph, &children, key, build)?,
            };
            debug!(target_name = %name, children = children.len(), "created target");

            target_nodes.insert(name.as_str(), (target.node(), output));
            targets.push((name.clone(), target));
        }

        info!(
            inputs = inputs.len(),
            targets = targets.len(),
            ?policy,
            "build graph ready"
        );
        Ok(Self {
            graph,
            inputs,
            targets,
            notifications,
        })
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets
            .iter()
            .find(|(target_name, _)| target_name == name)
            .map(|(_, target)| target)
    }

    /// Targets no other target builds on.
    pub fn roots(&self) -> Vec<(&str, &Target)> {
        let graph = self.graph.lock();
        self.targets
            .iter()
            .filter(|(_, target)| graph.parents(target.node()).is_empty())
            .map(|(name, target)| (name.as_str(), target))
            .collect()
    }

    /// Published after every handled change of any input.
    pub fn notifications(&self) -> &Channel<Message> {
        &self.notifications
    }

    /// Bring every root up to date and wait for the results.
    pub async fn build(&self) -> Result<Vec<(String, Digest)>> {
        let roots = self.roots();
        for (_, target) in &roots {
            target.compute()?;
        }

        let mut digests = Vec::with_capacity(roots.len());
        for (name, target) in roots {
            let digest = target.digest().await?;
            digests.push((name.to_string(), digest));
        }
        Ok(digests)
    }

    /// Stop every input watch and close the notification channel.
    ///
    /// All inputs are closed even if one fails; the first failure is
    /// returned.
    pub async fn close(&mut self) -> Result<()> {
        self.notifications.close();
        let mut first_error = None;
        for input in &mut self.inputs {
            if let Err(err) = input.close().await {
                warn!(path = ?input.path(), "input watch failed: {err}");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), |err| Err(err.into()))
    }
}

impl fmt::Debug for BuildEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildEngine")
            .field("inputs", &self.inputs)
            .field(
                "targets",
                &self.targets.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Build action of a manifest target: concatenate `sources`, one per child in
/// child order, into `output` and return the digest of what was written.
fn concatenate(
    fs: Arc<dyn FileSystem>,
    sources: Vec<PathBuf>,
    output: PathBuf,
) -> impl Fn(Snapshot) -> BoxFuture<'static, anyhow::Result<Digest>> + Send + Sync + 'static {
    let sources = Arc::new(sources);
    move |snapshot: Snapshot| {
        let fs = Arc::clone(&fs);
        let sources = Arc::clone(&sources);
        let output = output.clone();
        async move {
            // Upstream targets have to finish writing before they are read.
            for index in 0..snapshot.len() {
                if let Ok(upstream) = snapshot.pending::<Digest>(index) {
                    upstream.await?;
                }
            }

            let (digest, bytes, output) = tokio::task::spawn_blocking(move || {
                let mut contents = Vec::new();
                for source in sources.iter() {
                    contents.extend(fs.read(source)?);
                }
                fs.write(&output, &contents)?;
                anyhow::Ok((digest_bytes(&contents), contents.len(), output))
            })
            .await??;

            info!(?output, bytes, digest = %digest, "wrote output");
            Ok(digest)
        }
        .boxed()
    }
}
