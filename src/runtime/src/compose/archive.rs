//! Config tree packaging for upload into an image.

use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use osconfig_core::error::{OsConfigError, Result};
use sha2::{Digest, Sha256};

use super::configs::ConfigTree;

/// Information about a written archive.
#[derive(Debug, Clone)]
pub struct ArchiveInfo {
    /// Path to the tar.gz file
    pub path: PathBuf,
    /// SHA256 digest (hex string)
    pub digest: String,
    /// Size in bytes
    pub size: u64,
    /// Number of files packed
    pub entries: usize,
}

/// Write `tree` as a tar.gz with paths relative to `/`.
///
/// Only file entries are written, in sorted path order, with root ownership
/// and normalized modes and timestamps, so existing directories in the image
/// keep their own metadata.
pub fn write_archive(tree: &ConfigTree, output_path: &Path) -> Result<ArchiveInfo> {
    let file = std::fs::File::create(output_path).map_err(|e| {
        OsConfigError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to create archive {}: {}", output_path.display(), e),
        ))
    })?;

    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.mode(tar::HeaderMode::Deterministic);

    for (relative, entry) in tree {
        builder
            .append_path_with_name(&entry.source, relative)
            .map_err(|e| {
                OsConfigError::IoError(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to add {} (from layer {}) to archive: {}",
                        relative.display(),
                        entry.layer,
                        e
                    ),
                ))
            })?;
    }

    let encoder = builder.into_inner().map_err(|e| {
        OsConfigError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to finalize archive: {}", e),
        ))
    })?;
    encoder.finish()?;

    let digest = sha256_file(output_path)?;
    let size = std::fs::metadata(output_path).map(|m| m.len()).unwrap_or(0);

    Ok(ArchiveInfo {
        path: output_path.to_path_buf(),
        digest,
        size,
        entries: tree.len(),
    })
}

/// Compute SHA256 digest of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let data = std::fs::read(path).map_err(|e| {
        OsConfigError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to read file for hashing {}: {}", path.display(), e),
        ))
    })?;

    Ok(hex::encode(Sha256::digest(&data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::configs::ConfigEntry;
    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    fn tree(root: &Path, files: &[(&str, &str)]) -> ConfigTree {
        let mut tree = ConfigTree::new();
        for (rel, content) in files {
            let source = root.join("src").join(rel);
            std::fs::create_dir_all(source.parent().unwrap()).unwrap();
            std::fs::write(&source, content).unwrap();
            tree.insert(
                PathBuf::from(rel),
                ConfigEntry {
                    layer: "base".to_string(),
                    source,
                },
            );
        }
        tree
    }

    fn entries(archive: &Path) -> Vec<(String, String, u64)> {
        let file = std::fs::File::open(archive).unwrap();
        let mut tar = tar::Archive::new(GzDecoder::new(file));
        tar.entries()
            .unwrap()
            .map(|e| {
                let mut e = e.unwrap();
                let path = e.path().unwrap().to_string_lossy().into_owned();
                let uid = e.header().uid().unwrap();
                let mut content = String::new();
                std::io::Read::read_to_string(&mut e, &mut content).unwrap();
                (path, content, uid)
            })
            .collect()
    }

    #[test]
    fn test_archive_sorted_root_owned() {
        let tmp = TempDir::new().unwrap();
        let tree = tree(tmp.path(), &[("etc/z.conf", "z"), ("etc/app/a.conf", "a")]);
        let out = tmp.path().join("configs.tar.gz");

        let info = write_archive(&tree, &out).unwrap();
        assert_eq!(info.entries, 2);
        assert_eq!(info.digest.len(), 64);
        assert!(info.size > 0);

        assert_eq!(
            entries(&out),
            vec![
                ("etc/app/a.conf".to_string(), "a".to_string(), 0),
                ("etc/z.conf".to_string(), "z".to_string(), 0),
            ]
        );
    }

    #[test]
    fn test_archive_is_reproducible() {
        let tmp = TempDir::new().unwrap();
        let tree = tree(tmp.path(), &[("etc/app.conf", "x")]);

        let a = write_archive(&tree, &tmp.path().join("a.tar.gz")).unwrap();
        let b = write_archive(&tree, &tmp.path().join("b.tar.gz")).unwrap();
        assert_eq!(a.digest, b.digest);
    }

    #[test]
    fn test_empty_archive() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("empty.tar.gz");

        let info = write_archive(&ConfigTree::new(), &out).unwrap();
        assert_eq!(info.entries, 0);
        assert!(entries(&out).is_empty());
    }
}
