//! On-disk cache of fetched remote layers.
//!
//! Each clone lives under `cache_dir/<key>/` with its metadata stored
//! alongside as `<key>.meta.json`. An entry counts as present only when both
//! exist, so a torn clone (directory without metadata) is never served.

use std::path::{Path, PathBuf};

use osconfig_core::error::{OsConfigError, Result};
use serde::{Deserialize, Serialize};

use crate::fetch::RemoteReference;

/// Version of the cache-key scheme; bump when `RemoteReference::cache_key` changes.
pub const CACHE_SCHEME_VERSION: u32 = 1;

/// Metadata for a cached remote layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMeta {
    /// Cache key (directory name)
    pub key: String,
    /// Repository URL as given by the caller
    pub url: String,
    pub host: String,
    pub owner: String,
    pub repository: String,
    /// Branch or tag actually checked out
    pub branch: String,
    pub scheme_version: u32,
    /// When the clone was made or last refreshed (Unix timestamp)
    pub fetched_at: i64,
    /// Last time this entry was served (Unix timestamp)
    pub last_accessed: i64,
}

/// Cache of remote layer clones keyed by `RemoteReference::cache_key`.
#[derive(Debug, Clone)]
pub struct RemoteCache {
    /// e.g. `<home>/remote/v1`
    cache_dir: PathBuf,
}

impl RemoteCache {
    /// Open the cache at `cache_dir`. The directory is created on first write.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Directory a clone for `key` lives in, whether or not it exists.
    pub fn entry_dir(&self, key: &str) -> PathBuf {
        self.cache_dir.join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.meta.json", key))
    }

    /// Get the path of a cached clone.
    ///
    /// Returns `None` unless both the directory and its metadata exist.
    pub fn get(&self, key: &str) -> Result<Option<PathBuf>> {
        let entry_dir = self.entry_dir(key);
        let meta_path = self.meta_path(key);

        if !entry_dir.is_dir() || !meta_path.is_file() {
            return Ok(None);
        }

        if let Err(e) = self.touch_accessed(key) {
            tracing::debug!(key = %key, error = %e, "Failed to update last_accessed");
        }

        Ok(Some(entry_dir))
    }

    /// Record a cache hit in the entry's metadata.
    fn touch_accessed(&self, key: &str) -> Result<()> {
        let meta_path = self.meta_path(key);
        let content = std::fs::read_to_string(&meta_path)?;
        let mut meta: RemoteMeta = serde_json::from_str(&content)?;
        meta.last_accessed = chrono::Utc::now().timestamp();
        std::fs::write(&meta_path, serde_json::to_string_pretty(&meta)?)?;
        Ok(())
    }

    /// Read the metadata of one entry.
    pub fn meta(&self, key: &str) -> Option<RemoteMeta> {
        let content = std::fs::read_to_string(self.meta_path(key)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Make sure the cache directory exists.
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|e| {
            OsConfigError::CacheError(format!(
                "Failed to create remote cache directory {}: {}",
                self.cache_dir.display(),
                e
            ))
        })
    }

    /// Record a completed clone of `reference` under its cache key.
    pub fn commit(&self, reference: &RemoteReference) -> Result<RemoteMeta> {
        let key = reference.cache_key();
        let now = chrono::Utc::now().timestamp();
        let meta = RemoteMeta {
            key: key.clone(),
            url: reference.url.clone(),
            host: reference.host.clone(),
            owner: reference.owner.clone(),
            repository: reference.repository.clone(),
            branch: reference.branch.clone(),
            scheme_version: CACHE_SCHEME_VERSION,
            fetched_at: now,
            last_accessed: now,
        };
        self.write_meta(&meta)?;

        tracing::debug!(
            key = %key,
            url = %reference.url,
            branch = %reference.branch,
            "Cached remote layer"
        );

        Ok(meta)
    }

    /// Bump `fetched_at` after a refresh.
    pub fn touch_fetched(&self, key: &str) -> Result<()> {
        if let Some(mut meta) = self.meta(key) {
            let now = chrono::Utc::now().timestamp();
            meta.fetched_at = now;
            meta.last_accessed = now;
            self.write_meta(&meta)?;
        }
        Ok(())
    }

    fn write_meta(&self, meta: &RemoteMeta) -> Result<()> {
        let meta_path = self.meta_path(&meta.key);
        std::fs::write(&meta_path, serde_json::to_string_pretty(meta)?).map_err(|e| {
            OsConfigError::CacheError(format!(
                "Failed to write remote metadata {}: {}",
                meta_path.display(),
                e
            ))
        })
    }

    /// Remove a cached clone and its metadata. Missing entries are not an error.
    pub fn invalidate(&self, key: &str) -> Result<()> {
        let entry_dir = self.entry_dir(key);
        let meta_path = self.meta_path(key);

        if entry_dir.exists() {
            std::fs::remove_dir_all(&entry_dir).map_err(|e| {
                OsConfigError::CacheError(format!(
                    "Failed to remove cached layer {}: {}",
                    entry_dir.display(),
                    e
                ))
            })?;
        }
        if meta_path.exists() {
            std::fs::remove_file(&meta_path).map_err(|e| {
                OsConfigError::CacheError(format!(
                    "Failed to remove remote metadata {}: {}",
                    meta_path.display(),
                    e
                ))
            })?;
        }

        Ok(())
    }

    /// List all cached entries, sorted by key.
    ///
    /// A missing cache directory yields an empty list.
    pub fn list_entries(&self) -> Result<Vec<RemoteMeta>> {
        let mut entries = Vec::new();

        if !self.cache_dir.is_dir() {
            return Ok(entries);
        }

        let read_dir = std::fs::read_dir(&self.cache_dir).map_err(|e| {
            OsConfigError::CacheError(format!(
                "Failed to read cache directory {}: {}",
                self.cache_dir.display(),
                e
            ))
        })?;

        for entry in read_dir {
            let entry = entry.map_err(|e| {
                OsConfigError::CacheError(format!("Failed to read directory entry: {}", e))
            })?;
            let path = entry.path();

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".meta.json") {
                continue;
            }
            if let Ok(content) = std::fs::read_to_string(&path) {
                if let Ok(meta) = serde_json::from_str::<RemoteMeta>(&content) {
                    if self.entry_dir(&meta.key).is_dir() {
                        entries.push(meta);
                    }
                }
            }
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}
