//! Layer data model shared by the store, composer and CLI.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding the config tree overlaid onto the image root.
pub const CONFIGS_DIR: &str = "configs";

/// Directory holding the requirement lists.
pub const PACKAGE_LISTS_DIR: &str = "package-lists";

/// Directory holding the layer's shell fragments.
pub const SCRIPTS_DIR: &str = "scripts";

/// Package family a requirement list feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementKind {
    /// RPM packages, installed with dnf
    Rpm,
    /// Debian packages, installed with apt-get
    Deb,
    /// Python packages, installed into an isolated venv
    Pip,
}

impl RequirementKind {
    /// All kinds, in the order requirement lists are processed.
    pub const ALL: [RequirementKind; 3] =
        [RequirementKind::Rpm, RequirementKind::Deb, RequirementKind::Pip];

    /// File name of this kind's list under `package-lists/`.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Rpm => "rpm-requirements.txt",
            Self::Deb => "dpm-requirements.txt",
            Self::Pip => "pip-requirements.txt",
        }
    }
}

impl std::fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rpm => write!(f, "rpm"),
            Self::Deb => write!(f, "deb"),
            Self::Pip => write!(f, "pip"),
        }
    }
}

impl std::str::FromStr for RequirementKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "rpm" => Ok(Self::Rpm),
            "deb" | "dpm" => Ok(Self::Deb),
            "pip" => Ok(Self::Pip),
            _ => Err(format!(
                "unknown package kind: '{}' (supported: rpm, deb, pip)",
                s
            )),
        }
    }
}

/// Where a layer came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayerOrigin {
    /// Authored in the local layers directory
    Local,
    /// Fetched from a git repository
    Remote { url: String, branch: String },
}

impl std::fmt::Display for LayerOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote { url, branch } => write!(f, "{}@{}", url, branch),
        }
    }
}

/// Handle to a validated layer directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    /// Name used for script function prefixes and log output
    pub name: String,
    /// Cache/collision key: the local name, or the remote cache key
    pub identity: String,
    /// Root of the layer directory
    pub path: PathBuf,
    pub origin: LayerOrigin,
}

impl Layer {
    pub fn configs_dir(&self) -> PathBuf {
        self.path.join(CONFIGS_DIR)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.path.join(SCRIPTS_DIR)
    }

    /// Path of the requirement list for `kind`.
    pub fn requirements_file(&self, kind: RequirementKind) -> PathBuf {
        requirements_file(&self.path, kind)
    }
}

/// Path of the requirement list for `kind` under a layer root.
pub fn requirements_file(layer_root: &Path, kind: RequirementKind) -> PathBuf {
    layer_root.join(PACKAGE_LISTS_DIR).join(kind.file_name())
}

/// Parse a requirement list: one entry per line, `#` lines and blanks skipped.
pub fn parse_requirements(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
