//! Image application states and step ordering.

use serde::{Deserialize, Serialize};

/// Pipeline state of an image application.
///
/// States advance strictly in the order the applier visits them; a failure
/// is reported against the state that was being entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyState {
    /// Output copy created and artifact staged on the host
    Staged,
    /// Config archive uploaded into the image
    Uploaded,
    /// Config archive extracted at the image root
    ConfigsExtracted,
    /// Generated layer script executed
    ScriptRun,
    /// Requirement lists installed
    PackagesInstalled,
    /// Output image moved into place
    Finalized,
}

impl std::fmt::Display for ApplyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Staged => write!(f, "staged"),
            Self::Uploaded => write!(f, "uploaded"),
            Self::ConfigsExtracted => write!(f, "configs-extracted"),
            Self::ScriptRun => write!(f, "script-run"),
            Self::PackagesInstalled => write!(f, "packages-installed"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

/// Whether layer scripts run before or after package installation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepOrder {
    /// Configs, then scripts, then packages
    #[default]
    ScriptsFirst,
    /// Configs, then packages, then scripts
    PackagesFirst,
}

impl std::str::FromStr for StepOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scripts-first" => Ok(Self::ScriptsFirst),
            "packages-first" => Ok(Self::PackagesFirst),
            _ => Err(format!(
                "unknown step order: '{}' (supported: scripts-first, packages-first)",
                s
            )),
        }
    }
}
