//! Cache-first remote layer fetcher.
//!
//! Resolves (url, branch) pairs to local clones under the remote cache. A
//! cached key is served as-is; refreshing is explicit. When the requested
//! branch does not exist upstream the fetcher retries once with the fallback
//! branch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use osconfig_core::error::{OsConfigError, Result};

use super::reference::RemoteReference;
use super::transport::GitTransport;
use crate::cache::{KeyLocks, RemoteCache};

/// Post-fetch check run under the key lock; a failing check evicts the entry.
pub type LayerCheck<'a> = &'a (dyn Fn(&Path) -> Result<()> + Send + Sync);

/// A remote layer available in the local cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedRemote {
    /// Reference actually checked out (after any fallback)
    pub reference: RemoteReference,
    pub key: String,
    pub path: PathBuf,
}

/// Fetches remote layers into the cache.
pub struct RemoteFetcher {
    cache: RemoteCache,
    transport: Arc<dyn GitTransport>,
    locks: KeyLocks,
    default_branch: String,
    fallback_branch: String,
}

impl RemoteFetcher {
    /// Create a fetcher caching into `cache_dir`.
    pub fn new(cache_dir: &Path, transport: Arc<dyn GitTransport>) -> Self {
        Self {
            cache: RemoteCache::new(cache_dir),
            transport,
            locks: KeyLocks::new(),
            default_branch: "main".to_string(),
            fallback_branch: "master".to_string(),
        }
    }

    /// Override the default and fallback branch names.
    pub fn with_branches(mut self, default: impl Into<String>, fallback: impl Into<String>) -> Self {
        self.default_branch = default.into();
        self.fallback_branch = fallback.into();
        self
    }

    pub fn cache(&self) -> &RemoteCache {
        &self.cache
    }

    /// Parse `url` pinned to `branch`, or to the default branch.
    pub fn reference(&self, url: &str, branch: Option<&str>) -> Result<RemoteReference> {
        RemoteReference::parse(url, branch.unwrap_or(&self.default_branch))
    }

    /// Fetch a remote layer, using the cache if available.
    pub async fn fetch(&self, url: &str, branch: Option<&str>) -> Result<FetchedRemote> {
        self.fetch_checked(url, branch, &|_| Ok(())).await
    }

    /// Fetch a remote layer and run `check` on it while holding the key lock.
    pub async fn fetch_checked(
        &self,
        url: &str,
        branch: Option<&str>,
        check: LayerCheck<'_>,
    ) -> Result<FetchedRemote> {
        let requested = self.reference(url, branch)?;

        // A cached clone under either key is a hit; upstream is asked only on a miss
        if requested.branch != self.fallback_branch {
            if let Some(fetched) = self.cached(&requested, check).await? {
                return Ok(fetched);
            }
            let fallback = requested.with_branch(&self.fallback_branch)?;
            if let Some(fetched) = self.cached(&fallback, check).await? {
                tracing::debug!(
                    url = %requested.url,
                    requested = %requested.branch,
                    fallback = %fallback.branch,
                    "Using cached fallback branch"
                );
                return Ok(fetched);
            }
        }

        match self.fetch_exact(&requested, check).await {
            Err(OsConfigError::RemoteNotFound { .. })
                if requested.branch != self.fallback_branch =>
            {
                let fallback = requested.with_branch(&self.fallback_branch)?;
                tracing::warn!(
                    url = %requested.url,
                    requested = %requested.branch,
                    fallback = %fallback.branch,
                    "Branch not found upstream, trying fallback"
                );
                self.fetch_exact(&fallback, check)
                    .await
                    .map_err(|e| match e {
                        OsConfigError::RemoteNotFound { .. } => OsConfigError::RemoteNotFound {
                            url: requested.url.clone(),
                            tried: vec![requested.branch.clone(), fallback.branch.clone()],
                        },
                        other => other,
                    })
            }
            other => other,
        }
    }

    /// Update an already-cached layer from upstream.
    ///
    /// Looks for the requested branch first, then the fallback branch; if
    /// neither is cached this is a plain fetch.
    pub async fn refresh(
        &self,
        url: &str,
        branch: Option<&str>,
        check: LayerCheck<'_>,
    ) -> Result<FetchedRemote> {
        let requested = self.reference(url, branch)?;
        let mut candidates = vec![requested.clone()];
        if requested.branch != self.fallback_branch {
            candidates.push(requested.with_branch(&self.fallback_branch)?);
        }

        for reference in candidates {
            let key = reference.cache_key();
            let _guard = self.locks.lock(&key).await;
            if let Some(path) = self.cache.get(&key)? {
                tracing::info!(key = %key, url = %reference.url, "Refreshing remote layer");
                self.transport.pull(&path).await?;
                self.cache.touch_fetched(&key)?;
                self.check_or_evict(&key, &path, check)?;
                return Ok(FetchedRemote {
                    reference,
                    key,
                    path,
                });
            }
        }

        self.fetch_checked(url, branch, check).await
    }

    /// Remove a cached entry under its key lock.
    pub async fn evict(&self, key: &str) -> Result<()> {
        let _guard = self.locks.lock(key).await;
        self.cache.invalidate(key)
    }

    /// Cache lookup only, under the key lock.
    async fn cached(
        &self,
        reference: &RemoteReference,
        check: LayerCheck<'_>,
    ) -> Result<Option<FetchedRemote>> {
        let key = reference.cache_key();
        let _guard = self.locks.lock(&key).await;
        self.cache_hit(reference, key, check)
    }

    fn cache_hit(
        &self,
        reference: &RemoteReference,
        key: String,
        check: LayerCheck<'_>,
    ) -> Result<Option<FetchedRemote>> {
        match self.cache.get(&key)? {
            Some(path) => {
                tracing::debug!(key = %key, "Using cached remote layer");
                self.check_or_evict(&key, &path, check)?;
                Ok(Some(FetchedRemote {
                    reference: reference.clone(),
                    key,
                    path,
                }))
            }
            None => Ok(None),
        }
    }

    async fn fetch_exact(
        &self,
        reference: &RemoteReference,
        check: LayerCheck<'_>,
    ) -> Result<FetchedRemote> {
        let key = reference.cache_key();
        let _guard = self.locks.lock(&key).await;

        if let Some(fetched) = self.cache_hit(reference, key.clone(), check)? {
            return Ok(fetched);
        }

        if !self
            .transport
            .ref_exists(&reference.url, &reference.branch)
            .await?
        {
            return Err(OsConfigError::RemoteNotFound {
                url: reference.url.clone(),
                tried: vec![reference.branch.clone()],
            });
        }

        self.cache.ensure_dir()?;
        // Leftover directory from an interrupted clone
        self.cache.invalidate(&key)?;

        let dest = self.cache.entry_dir(&key);
        tracing::info!(
            url = %reference.url,
            branch = %reference.branch,
            dest = %dest.display(),
            "Cloning remote layer"
        );
        if let Err(e) = self
            .transport
            .clone_ref(&reference.url, &reference.branch, &dest)
            .await
        {
            let _ = self.cache.invalidate(&key);
            return Err(e);
        }

        self.cache.commit(reference)?;
        self.check_or_evict(&key, &dest, check)?;

        Ok(FetchedRemote {
            reference: reference.clone(),
            key,
            path: dest,
        })
    }

    fn check_or_evict(&self, key: &str, path: &Path, check: LayerCheck<'_>) -> Result<()> {
        if let Err(e) = check(path) {
            tracing::warn!(key = %key, error = %e, "Evicting invalid remote layer");
            self.cache.invalidate(key)?;
            return Err(e);
        }
        Ok(())
    }
}
