//! Composer (squasher) - merges an ordered layer stack into one artifact.
//!
//! - requirement lists are concatenated in layer order and deduplicated
//! - config trees are overlaid, the later layer winning per path
//! - layer scripts are linearized into one fault-isolated bash script

pub mod archive;
pub mod configs;
pub mod requirements;
pub mod script;

use std::path::Path;

use osconfig_core::config::OsConfig;
use osconfig_core::error::Result;
use osconfig_core::layer::{Layer, RequirementKind};
use serde::Serialize;

pub use archive::{write_archive, ArchiveInfo};
pub use configs::{ConfigEntry, ConfigTree};
pub use requirements::{Dedup, Requirements};
pub use script::GeneratedScript;

/// Result of squashing a layer stack. Never persisted as a layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedArtifact {
    /// Layer names in precedence order
    pub layers: Vec<String>,
    pub requirements: Requirements,
    /// Merged config tree: path relative to `/` -> winning layer
    pub configs: ConfigTree,
    /// Generated script text
    pub script: String,
    /// Script functions in call order
    pub functions: Vec<String>,
}

impl ComposedArtifact {
    pub fn requirements(&self, kind: RequirementKind) -> &[String] {
        self.requirements.get(kind)
    }

    /// Whether any layer contributed a script.
    pub fn has_script(&self) -> bool {
        !self.functions.is_empty()
    }

    /// Package the merged config tree as a tar.gz.
    pub fn write_archive(&self, path: &Path) -> Result<ArchiveInfo> {
        write_archive(&self.configs, path)
    }

    /// Write the generated script, executable.
    pub fn write_script(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.script)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
        }
        Ok(())
    }
}

/// Squashes ordered layers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Composer {
    dedup: Dedup,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &OsConfig) -> Self {
        let dedup = if config.dedup_requirements {
            Dedup::FirstOccurrence
        } else {
            Dedup::KeepAll
        };
        Self::new().with_dedup(dedup)
    }

    pub fn with_dedup(mut self, dedup: Dedup) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn dedup(&self) -> Dedup {
        self.dedup
    }

    /// Merge `layers`, earliest first. Later layers take precedence.
    pub fn squash(&self, layers: &[Layer]) -> Result<ComposedArtifact> {
        let requirements = requirements::merge_layers(layers, self.dedup)?;
        let configs = configs::merge_configs(layers)?;
        let script = script::generate(layers)?;

        tracing::info!(
            layers = layers.len(),
            rpm = requirements.rpm.len(),
            deb = requirements.deb.len(),
            pip = requirements.pip.len(),
            configs = configs.len(),
            scripts = script.functions.len(),
            "Squashed layers"
        );

        Ok(ComposedArtifact {
            layers: layers.iter().map(|l| l.name.clone()).collect(),
            requirements,
            configs,
            script: script.text,
            functions: script.functions,
        })
    }
}
