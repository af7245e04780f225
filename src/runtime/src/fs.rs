//! Filesystem helpers shared by the store, composer and applier.

use osconfig_core::error::{OsConfigError, Result};
use std::path::{Component, Path, PathBuf};

/// Recursively copy a directory and its contents.
pub(crate) fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst).map_err(|e| {
        OsConfigError::CacheError(format!(
            "Failed to create directory {}: {}",
            dst.display(),
            e
        ))
    })?;

    for entry in std::fs::read_dir(src).map_err(|e| {
        OsConfigError::CacheError(format!(
            "Failed to read directory {}: {}",
            src.display(),
            e
        ))
    })? {
        let entry = entry.map_err(|e| {
            OsConfigError::CacheError(format!("Failed to read directory entry: {}", e))
        })?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path).map_err(|e| {
                OsConfigError::CacheError(format!(
                    "Failed to copy {} to {}: {}",
                    src_path.display(),
                    dst_path.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}

/// Collect the relative paths of all regular files under `root`, sorted.
///
/// A missing root yields an empty list.
pub(crate) fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if root.is_dir() {
        walk_files(root, root, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn walk_files(root: &Path, current: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let read_dir = std::fs::read_dir(current).map_err(|e| {
        OsConfigError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to read directory {}: {}", current.display(), e),
        ))
    })?;

    for entry in read_dir {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_files(root, &path, files)?;
        } else if file_type.is_file() || file_type.is_symlink() {
            let relative = path
                .strip_prefix(root)
                .map_err(|e| {
                    OsConfigError::InvalidPath(format!(
                        "Failed to compute relative path for {}: {}",
                        path.display(),
                        e
                    ))
                })?
                .to_path_buf();
            files.push(relative);
        }
    }

    Ok(())
}

/// Check that `path` is relative and stays inside whatever it is joined to.
pub(crate) fn ensure_contained(path: &Path) -> Result<()> {
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(OsConfigError::InvalidPath(format!(
                    "'{}' must be a relative path without '..'",
                    path.display()
                )))
            }
        }
    }
    Ok(())
}
