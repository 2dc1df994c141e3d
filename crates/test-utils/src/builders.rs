#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use incrbuild::config::{ConfigSection, Manifest, RawManifest, TargetConfig};
use incrbuild::types::UpdatePolicy;

/// Builder for `Manifest` to simplify test setup.
pub struct ManifestBuilder {
    manifest: RawManifest,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self {
            manifest: RawManifest {
                config: ConfigSection::default(),
                target: BTreeMap::new(),
            },
        }
    }

    pub fn with_target(mut self, name: &str, target: TargetConfig) -> Self {
        self.manifest.target.insert(name.to_string(), target);
        self
    }

    pub fn with_policy(mut self, policy: UpdatePolicy) -> Self {
        self.manifest.config.update_policy = policy;
        self
    }

    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.manifest.config.debounce_ms = debounce_ms;
        self
    }

    pub fn raw(self) -> RawManifest {
        self.manifest
    }

    pub fn build(self) -> Manifest {
        Manifest::try_from(self.manifest).expect("Failed to build valid manifest from builder")
    }
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TargetConfig`.
pub struct TargetBuilder {
    target: TargetConfig,
}

impl TargetBuilder {
    pub fn new(output: &str) -> Self {
        Self {
            target: TargetConfig {
                output: PathBuf::from(output),
                inputs: vec![],
                after: vec![],
            },
        }
    }

    pub fn input(mut self, path: &str) -> Self {
        self.target.inputs.push(PathBuf::from(path));
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.target.after.push(dep.to_string());
        self
    }

    pub fn build(self) -> TargetConfig {
        self.target
    }
}
