//! Layer directory layout.
//!
//! A layer root contains:
//!
//! ```text
//! configs/                          tree overlaid onto the image root
//! package-lists/rpm-requirements.txt
//! package-lists/dpm-requirements.txt
//! package-lists/pip-requirements.txt
//! scripts/                          shell fragments
//! ```

use std::path::Path;

use osconfig_core::error::{OsConfigError, Result};
use osconfig_core::layer::{
    requirements_file, RequirementKind, CONFIGS_DIR, PACKAGE_LISTS_DIR, SCRIPTS_DIR,
};

/// Directories every layer must have.
pub const REQUIRED_DIRS: [&str; 3] = [CONFIGS_DIR, PACKAGE_LISTS_DIR, SCRIPTS_DIR];

/// Whether `path` is a structurally valid layer. Never touches the filesystem
/// beyond metadata reads.
pub fn validate(path: &Path) -> bool {
    check(path).is_ok()
}

/// Like [`validate`], but reports what is missing.
pub fn check(path: &Path) -> Result<()> {
    let invalid = |reason: String| OsConfigError::InvalidLayerStructure {
        path: path.display().to_string(),
        reason,
    };

    if !path.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }
    for dir in REQUIRED_DIRS {
        if !path.join(dir).is_dir() {
            return Err(invalid(format!("missing directory {}/", dir)));
        }
    }
    for kind in RequirementKind::ALL {
        if !requirements_file(path, kind).is_file() {
            return Err(invalid(format!(
                "missing file {}/{}",
                PACKAGE_LISTS_DIR,
                kind.file_name()
            )));
        }
    }
    Ok(())
}

/// Populate an existing, empty directory with the layer skeleton.
pub fn create_skeleton(path: &Path) -> Result<()> {
    for dir in REQUIRED_DIRS {
        let dir_path = path.join(dir);
        std::fs::create_dir_all(&dir_path).map_err(|e| {
            OsConfigError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create {}: {}", dir_path.display(), e),
            ))
        })?;
    }
    for kind in RequirementKind::ALL {
        let file = requirements_file(path, kind);
        std::fs::write(&file, "").map_err(|e| {
            OsConfigError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create {}: {}", file.display(), e),
            ))
        })?;
    }
    Ok(())
}
