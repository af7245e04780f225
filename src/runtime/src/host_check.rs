//! Host prerequisite detection.
//!
//! Checks that the external tools the pipeline shells out to are installed,
//! and that a base image path looks usable:
//! - `virt-customize` and `guestfish` (libguestfs) for image customization
//! - `git` for remote layers

use std::path::{Path, PathBuf};

use osconfig_core::error::{OsConfigError, Result};

/// Host tools required by the pipeline.
pub const REQUIRED_TOOLS: [&str; 3] = ["virt-customize", "guestfish", "git"];

/// Result of looking up one host tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: String,
    /// Resolved location on `PATH`, if found
    pub path: Option<PathBuf>,
}

impl ToolStatus {
    pub fn found(&self) -> bool {
        self.path.is_some()
    }
}

/// Look up every required tool on `PATH`.
pub fn check_dependencies() -> Vec<ToolStatus> {
    check_tools(&REQUIRED_TOOLS)
}

/// Look up the given tools on `PATH`.
pub fn check_tools(tools: &[&str]) -> Vec<ToolStatus> {
    tools
        .iter()
        .map(|name| ToolStatus {
            name: name.to_string(),
            path: which::which(name).ok(),
        })
        .collect()
}

/// Fail with the list of missing tools, if any.
pub fn require_dependencies() -> Result<()> {
    let missing: Vec<String> = check_dependencies()
        .into_iter()
        .filter(|t| !t.found())
        .map(|t| t.name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(OsConfigError::Unsupported(format!(
            "missing host tools: {} (install libguestfs-tools and git)",
            missing.join(", ")
        )))
    }
}

/// Check that `path` is an existing `.qcow2` image file.
pub fn check_image_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(OsConfigError::ImageNotFound(path.display().to_string()));
    }
    let is_qcow2 = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("qcow2"));
    if !is_qcow2 {
        return Err(OsConfigError::ImageNotFound(format!(
            "{} is not a .qcow2 image",
            path.display()
        )));
    }
    Ok(())
}
