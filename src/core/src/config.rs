use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::apply::StepOrder;
use crate::error::{OsConfigError, Result};

/// Environment variable overriding the store root.
pub const HOME_ENV: &str = "OSCONFIG_HOME";

/// Name of the optional config file inside the store root.
pub const CONFIG_FILE: &str = "config.toml";

/// osconfig configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OsConfig {
    /// Store root (local layers, remote cache, config file)
    pub home: PathBuf,

    /// Time bound for each git invocation, in seconds
    pub fetch_timeout_secs: u64,

    /// Time bound for each image customizer invocation, in seconds
    pub apply_timeout_secs: u64,

    /// Branch used when a git reference names none
    pub default_branch: String,

    /// Branch tried once when the requested ref does not exist
    pub fallback_branch: String,

    /// Interpreter used to create the in-image venv
    pub runtime_version: String,

    /// In-image prefix of the isolated runtime environment
    pub runtime_prefix: String,

    /// In-image path the generated script is uploaded to
    pub script_path: String,

    /// Drop repeated requirement entries, keeping the first
    pub dedup_requirements: bool,

    /// Whether scripts run before or after package installation
    pub step_order: StepOrder,
}

impl Default for OsConfig {
    fn default() -> Self {
        Self {
            home: Self::default_home(),
            fetch_timeout_secs: 300,
            apply_timeout_secs: 1800,
            default_branch: "main".to_string(),
            fallback_branch: "master".to_string(),
            runtime_version: "python3".to_string(),
            runtime_prefix: "/opt/os-python-venv".to_string(),
            script_path: "/opt/squashed_script.sh".to_string(),
            dedup_requirements: true,
            step_order: StepOrder::default(),
        }
    }
}

impl OsConfig {
    /// Default store root (`~/.cache/osconfig`).
    pub fn default_home() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("osconfig")
    }

    /// Load configuration.
    ///
    /// Reads `path` when given (it must exist), otherwise `<home>/config.toml`
    /// when present. `OSCONFIG_HOME` overrides the home directory before the
    /// implicit file is looked up.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_home = std::env::var_os(HOME_ENV).map(PathBuf::from);

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let home = env_home.clone().unwrap_or_else(Self::default_home);
                let implicit = home.join(CONFIG_FILE);
                if implicit.is_file() {
                    Self::from_file(&implicit)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(home) = env_home {
            config.home = home;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OsConfigError::ConfigError(format!(
                "Failed to read config {}: {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content)
            .map_err(|e| OsConfigError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    fn validate(&self) -> Result<()> {
        if self.fetch_timeout_secs == 0 || self.apply_timeout_secs == 0 {
            return Err(OsConfigError::ConfigError(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.default_branch.is_empty() || self.fallback_branch.is_empty() {
            return Err(OsConfigError::ConfigError(
                "default_branch and fallback_branch must be set".to_string(),
            ));
        }
        if !self.runtime_prefix.starts_with('/') || !self.script_path.starts_with('/') {
            return Err(OsConfigError::ConfigError(
                "runtime_prefix and script_path must be absolute in-image paths".to_string(),
            ));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }
}
