// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::UpdatePolicy;

/// Manifest as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// update_policy = "lazy"
/// debounce_ms = 1000
///
/// [target.greeting]
/// output = "out/greeting.txt"
/// inputs = ["hello.txt", "world.txt"]
///
/// [target.banner]
/// output = "out/banner.txt"
/// inputs = ["stars.txt"]
/// after = ["greeting"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawManifest {
    #[serde(default)]
    pub config: ConfigSection,

    /// Keys are the target names.
    #[serde(default)]
    pub target: BTreeMap<String, TargetConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// How input changes reach the targets.
    #[serde(default)]
    pub update_policy: UpdatePolicy,

    /// Changes to one input within this window of the last handled change
    /// are ignored. `0` disables debouncing.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    1000
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            update_policy: UpdatePolicy::default(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// `[target.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// File the target writes, relative to the manifest.
    pub output: PathBuf,

    /// Files concatenated into the output, in order.
    #[serde(default)]
    pub inputs: Vec<PathBuf>,

    /// Targets whose outputs are prepended to `inputs`.
    #[serde(default)]
    pub after: Vec<String>,
}

/// A validated manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub config: ConfigSection,
    pub target: BTreeMap<String, TargetConfig>,
    order: Vec<String>,
}

impl Manifest {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        target: BTreeMap<String, TargetConfig>,
        order: Vec<String>,
    ) -> Self {
        Self {
            config,
            target,
            order,
        }
    }

    /// Target names, dependencies before dependents.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.config.debounce_ms)
    }

    /// Every input file in order of first use.
    pub fn input_files(&self) -> Vec<&PathBuf> {
        let mut files: Vec<&PathBuf> = Vec::new();
        for name in &self.order {
            if let Some(target) = self.target.get(name) {
                for input in &target.inputs {
                    if !files.contains(&input) {
                        files.push(input);
                    }
                }
            }
        }
        files
    }
}
