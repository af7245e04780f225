//! LayerStore - owner of local and cached remote layer directories.
//!
//! Store layout:
//!
//! ```text
//! <root>/layers/<name>/              locally authored layers
//! <root>/remote/v1/<key>/            cached remote clones
//! <root>/remote/v1/<key>.meta.json   clone metadata
//! ```

use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use osconfig_core::config::OsConfig;
use osconfig_core::error::{OsConfigError, Result};
use osconfig_core::layer::{Layer, LayerOrigin, RequirementKind};

use super::layout;
use crate::cache::{RemoteMeta, CACHE_SCHEME_VERSION};
use crate::fetch::{FetchedRemote, GitCli, GitTransport, RemoteFetcher};
use crate::fs::ensure_contained;

/// Directory under the store root holding local layers.
pub const LOCAL_DIR: &str = "layers";

/// Directory under the store root holding remote clones.
pub const REMOTE_DIR: &str = "remote";

/// Manages layer directories under one root.
pub struct LayerStore {
    root: PathBuf,
    local_dir: PathBuf,
    fetcher: RemoteFetcher,
}

impl LayerStore {
    /// Open a store rooted at `root`, fetching remote layers through `transport`.
    ///
    /// Nothing is created on disk until a layer is written.
    pub fn new(root: &Path, transport: Arc<dyn GitTransport>) -> Self {
        let remote_dir = root
            .join(REMOTE_DIR)
            .join(format!("v{}", CACHE_SCHEME_VERSION));
        Self {
            root: root.to_path_buf(),
            local_dir: root.join(LOCAL_DIR),
            fetcher: RemoteFetcher::new(&remote_dir, transport),
        }
    }

    /// Open the store described by `config`, using the git CLI.
    pub fn from_config(config: &OsConfig) -> Self {
        let transport = Arc::new(GitCli::new(config.fetch_timeout()));
        Self::new(&config.home, transport)
            .with_branches(&config.default_branch, &config.fallback_branch)
    }

    /// Override the default and fallback branch names used for imports.
    pub fn with_branches(mut self, default: &str, fallback: &str) -> Self {
        self.fetcher = self.fetcher.with_branches(default, fallback);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn fetcher(&self) -> &RemoteFetcher {
        &self.fetcher
    }

    /// Create an empty local layer.
    pub fn create(&self, name: &str) -> Result<Layer> {
        validate_name(name)?;
        std::fs::create_dir_all(&self.local_dir).map_err(|e| {
            OsConfigError::IoError(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create layers directory {}: {}",
                    self.local_dir.display(),
                    e
                ),
            ))
        })?;

        let path = self.local_dir.join(name);
        // create_dir fails on an existing entry, so two racing creates cannot both win
        std::fs::create_dir(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                OsConfigError::AlreadyExists(name.to_string())
            } else {
                OsConfigError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create layer {}: {}", path.display(), e),
                ))
            }
        })?;

        if let Err(e) = layout::create_skeleton(&path) {
            let _ = std::fs::remove_dir_all(&path);
            return Err(e);
        }

        tracing::info!(layer = %name, path = %path.display(), "Created layer");
        Ok(local_layer(name, path))
    }

    /// Structural check of a layer directory.
    pub fn validate(&self, path: &Path) -> bool {
        layout::validate(path)
    }

    /// Fetch a remote layer and validate it; an invalid clone is evicted.
    pub async fn import(&self, url: &str, branch: Option<&str>) -> Result<Layer> {
        let fetched = self
            .fetcher
            .fetch_checked(url, branch, &layout::check)
            .await?;
        tracing::info!(
            key = %fetched.key,
            url = %fetched.reference.url,
            branch = %fetched.reference.branch,
            "Imported remote layer"
        );
        Ok(remote_layer(fetched))
    }

    /// Pull upstream changes into a cached remote layer, then revalidate.
    pub async fn refresh(&self, url: &str, branch: Option<&str>) -> Result<Layer> {
        let fetched = self.fetcher.refresh(url, branch, &layout::check).await?;
        Ok(remote_layer(fetched))
    }

    /// Enumerate local layers, then cached remote layers.
    ///
    /// Missing directories yield an empty list.
    pub fn list(&self) -> Result<Vec<(String, LayerOrigin)>> {
        let mut layers = Vec::new();

        if self.local_dir.is_dir() {
            let mut names = Vec::new();
            for entry in std::fs::read_dir(&self.local_dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
            names.sort();
            layers.extend(names.into_iter().map(|n| (n, LayerOrigin::Local)));
        }

        for meta in self.fetcher.cache().list_entries()? {
            layers.push((meta.key.clone(), remote_origin(&meta)));
        }

        Ok(layers)
    }

    /// Look up a valid local layer.
    pub fn local(&self, name: &str) -> Result<Layer> {
        validate_name(name)?;
        let path = self.local_dir.join(name);
        if !path.is_dir() {
            return Err(OsConfigError::LayerNotFound(name.to_string()));
        }
        layout::check(&path)?;
        Ok(local_layer(name, path))
    }

    /// Look up a layer by local name or remote cache key.
    pub fn find(&self, name: &str) -> Result<Layer> {
        validate_name(name)?;
        if self.local_dir.join(name).is_dir() {
            return self.local(name);
        }

        let cache = self.fetcher.cache();
        match (cache.meta(name), cache.get(name)?) {
            (Some(meta), Some(path)) => {
                layout::check(&path)?;
                Ok(Layer {
                    name: meta.key.clone(),
                    identity: meta.key.clone(),
                    path,
                    origin: remote_origin(&meta),
                })
            }
            _ => Err(OsConfigError::LayerNotFound(name.to_string())),
        }
    }

    /// Copy `source` into the layer's config tree under `dest_dir`, keeping
    /// its file name.
    ///
    /// `dest_dir` is relative to the image root, e.g. `etc/nginx`.
    pub fn add_file(&self, layer: &str, source: &Path, dest_dir: &Path) -> Result<PathBuf> {
        let layer = self.find(layer)?;

        let relative = dest_dir.strip_prefix("/").unwrap_or(dest_dir);
        ensure_contained(relative)?;

        if !source.exists() {
            return Err(OsConfigError::SourceNotFound(source.display().to_string()));
        }
        if !source.is_file() {
            return Err(OsConfigError::SourceNotAFile(source.display().to_string()));
        }
        let file_name = source
            .file_name()
            .ok_or_else(|| OsConfigError::SourceNotAFile(source.display().to_string()))?;

        let target_dir = layer.configs_dir().join(relative);
        std::fs::create_dir_all(&target_dir).map_err(|e| {
            OsConfigError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create {}: {}", target_dir.display(), e),
            ))
        })?;

        let target = target_dir.join(file_name);
        std::fs::copy(source, &target).map_err(|e| {
            OsConfigError::IoError(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to copy {} to {}: {}",
                    source.display(),
                    target.display(),
                    e
                ),
            ))
        })?;

        tracing::info!(
            layer = %layer.name,
            source = %source.display(),
            dest = %target.display(),
            "Added file to layer"
        );
        Ok(target)
    }

    /// Append one package to a layer's requirement list. Duplicates are kept.
    pub fn add_requirement(&self, layer: &str, kind: RequirementKind, package: &str) -> Result<()> {
        let package = package.trim();
        if package.is_empty() || package.contains(['\n', '\r']) {
            return Err(OsConfigError::InvalidPackageName(package.to_string()));
        }

        let layer = self.find(layer)?;
        let path = layer.requirements_file(kind);

        let existing = std::fs::read(&path)?;
        let mut file = std::fs::OpenOptions::new().append(true).open(&path)?;
        if existing.last().is_some_and(|b| *b != b'\n') {
            file.write_all(b"\n")?;
        }
        writeln!(file, "{}", package)?;

        tracing::info!(layer = %layer.name, kind = %kind, package = %package, "Added requirement");
        Ok(())
    }

    /// Delete a local layer, or a cached remote layer by cache key.
    pub async fn delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;

        let local = self.local_dir.join(name);
        if local.is_dir() {
            std::fs::remove_dir_all(&local).map_err(|e| {
                OsConfigError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("Failed to delete layer {}: {}", local.display(), e),
                ))
            })?;
            tracing::info!(layer = %name, "Deleted local layer");
            return Ok(());
        }

        let cache = self.fetcher.cache();
        if cache.meta(name).is_some() || cache.entry_dir(name).is_dir() {
            self.fetcher.evict(name).await?;
            tracing::info!(key = %name, "Deleted cached remote layer");
            return Ok(());
        }

        Err(OsConfigError::LayerNotFound(name.to_string()))
    }
}

/// Layer names and cache keys are single plain path components.
fn validate_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single || name.contains(['/', '\\']) || name.ends_with(".meta.json") {
        return Err(OsConfigError::InvalidLayerName(name.to_string()));
    }
    Ok(())
}

fn local_layer(name: &str, path: PathBuf) -> Layer {
    Layer {
        name: name.to_string(),
        identity: name.to_string(),
        path,
        origin: LayerOrigin::Local,
    }
}

fn remote_layer(fetched: FetchedRemote) -> Layer {
    Layer {
        name: fetched.reference.repository.clone(),
        identity: fetched.key,
        path: fetched.path,
        origin: LayerOrigin::Remote {
            url: fetched.reference.url,
            branch: fetched.reference.branch,
        },
    }
}

fn remote_origin(meta: &RemoteMeta) -> LayerOrigin {
    LayerOrigin::Remote {
        url: meta.url.clone(),
        branch: meta.branch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::RemoteReference;
    use crate::testing::{write_layer, FakeGit, LayerFixture};
    use tempfile::TempDir;

    const URL: &str = "https://github.com/org/web-layer.git";

    fn store(tmp: &TempDir) -> (LayerStore, Arc<FakeGit>) {
        let git = Arc::new(FakeGit::new());
        (LayerStore::new(&tmp.path().join("home"), git.clone()), git)
    }

    #[test]
    fn test_create_layer() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = store(&tmp);

        let layer = store.create("base").unwrap();
        assert_eq!(layer.name, "base");
        assert_eq!(layer.identity, "base");
        assert_eq!(layer.origin, LayerOrigin::Local);
        assert!(store.validate(&layer.path));
    }

    #[test]
    fn test_create_existing_fails() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = store(&tmp);

        store.create("base").unwrap();
        assert!(matches!(
            store.create("base"),
            Err(OsConfigError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_create_rejects_bad_names() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = store(&tmp);

        for name in ["", ".", "..", "a/b", "../escape", "/abs"] {
            assert!(
                matches!(store.create(name), Err(OsConfigError::InvalidLayerName(_))),
                "expected InvalidLayerName for '{}'",
                name
            );
        }
    }

    #[test]
    fn test_list_empty_store() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = store(&tmp);
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_local_and_remote() {
        let tmp = TempDir::new().unwrap();
        let (store, git) = store(&tmp);
        let upstream = tmp.path().join("upstream");
        write_layer(&upstream, &LayerFixture::default());
        git.publish(URL, "main", &upstream);

        store.create("zeta").unwrap();
        store.create("alpha").unwrap();
        let remote = store.import(URL, None).await.unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0], ("alpha".to_string(), LayerOrigin::Local));
        assert_eq!(listed[1], ("zeta".to_string(), LayerOrigin::Local));
        assert_eq!(listed[2].0, remote.identity);
        assert_eq!(
            listed[2].1,
            LayerOrigin::Remote {
                url: URL.to_string(),
                branch: "main".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_import_invalid_layer_is_evicted() {
        let tmp = TempDir::new().unwrap();
        let (store, git) = store(&tmp);
        let upstream = tmp.path().join("upstream");
        std::fs::create_dir_all(upstream.join("configs")).unwrap();
        git.publish(URL, "main", &upstream);

        let result = store.import(URL, None).await;
        assert!(matches!(
            result,
            Err(OsConfigError::InvalidLayerStructure { .. })
        ));

        let key = RemoteReference::parse(URL, "main").unwrap().cache_key();
        assert!(!store.fetcher().cache().entry_dir(&key).exists());
        assert!(store.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_uses_versioned_cache_dir() {
        let tmp = TempDir::new().unwrap();
        let (store, git) = store(&tmp);
        let upstream = tmp.path().join("upstream");
        write_layer(&upstream, &LayerFixture::default());
        git.publish(URL, "main", &upstream);

        let layer = store.import(URL, None).await.unwrap();
        assert!(layer.path.starts_with(tmp.path().join("home/remote/v1")));
        assert_eq!(layer.name, "web-layer");
    }

    #[test]
    fn test_add_file_copies_into_configs() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = store(&tmp);
        let layer = store.create("base").unwrap();
        let source = tmp.path().join("app.conf");
        std::fs::write(&source, "port = 80").unwrap();

        let target = store
            .add_file("base", &source, Path::new("/etc/app"))
            .unwrap();

        assert_eq!(target, layer.configs_dir().join("etc/app/app.conf"));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "port = 80");
        assert!(source.exists());
    }

    #[test]
    fn test_add_file_errors() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = store(&tmp);
        store.create("base").unwrap();
        let source = tmp.path().join("app.conf");
        std::fs::write(&source, "x").unwrap();

        assert!(matches!(
            store.add_file("missing", &source, Path::new("etc")),
            Err(OsConfigError::LayerNotFound(_))
        ));
        assert!(matches!(
            store.add_file("base", &tmp.path().join("nope"), Path::new("etc")),
            Err(OsConfigError::SourceNotFound(_))
        ));
        assert!(matches!(
            store.add_file("base", tmp.path(), Path::new("etc")),
            Err(OsConfigError::SourceNotAFile(_))
        ));
        assert!(matches!(
            store.add_file("base", &source, Path::new("etc/../../x")),
            Err(OsConfigError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_add_requirement_appends_duplicates() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = store(&tmp);
        let layer = store.create("base").unwrap();

        store.add_requirement("base", RequirementKind::Rpm, "git").unwrap();
        store.add_requirement("base", RequirementKind::Rpm, "git").unwrap();
        store.add_requirement("base", RequirementKind::Pip, "requests").unwrap();

        let rpm = std::fs::read_to_string(layer.requirements_file(RequirementKind::Rpm)).unwrap();
        assert_eq!(rpm, "git\ngit\n");
        let pip = std::fs::read_to_string(layer.requirements_file(RequirementKind::Pip)).unwrap();
        assert_eq!(pip, "requests\n");
    }

    #[test]
    fn test_add_requirement_after_unterminated_line() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = store(&tmp);
        let layer = store.create("base").unwrap();
        let path = layer.requirements_file(RequirementKind::Deb);
        std::fs::write(&path, "vim").unwrap();

        store.add_requirement("base", RequirementKind::Deb, "curl").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "vim\ncurl\n");
    }

    #[test]
    fn test_add_requirement_unknown_layer() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = store(&tmp);
        assert!(matches!(
            store.add_requirement("ghost", RequirementKind::Rpm, "git"),
            Err(OsConfigError::LayerNotFound(_))
        ));
    }

    #[test]
    fn test_add_requirement_rejects_bad_package() {
        let tmp = TempDir::new().unwrap();
        let (store, _) = store(&tmp);
        store.create("base").unwrap();

        for bad in ["", "   ", "git\ncurl"] {
            assert!(matches!(
                store.add_requirement("base", RequirementKind::Rpm, bad),
                Err(OsConfigError::InvalidPackageName(_))
            ));
        }
        let list = store
            .local_dir()
            .join("base/package-lists/rpm-requirements.txt");
        assert_eq!(std::fs::read_to_string(list).unwrap(), "");
    }

    #[tokio::test]
    async fn test_delete_local_and_remote() {
        let tmp = TempDir::new().unwrap();
        let (store, git) = store(&tmp);
        let upstream = tmp.path().join("upstream");
        write_layer(&upstream, &LayerFixture::default());
        git.publish(URL, "main", &upstream);

        store.create("base").unwrap();
        let remote = store.import(URL, None).await.unwrap();

        store.delete("base").await.unwrap();
        store.delete(&remote.identity).await.unwrap();

        assert!(store.list().unwrap().is_empty());
        assert!(matches!(
            store.delete("base").await,
            Err(OsConfigError::LayerNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_remote_by_key() {
        let tmp = TempDir::new().unwrap();
        let (store, git) = store(&tmp);
        let upstream = tmp.path().join("upstream");
        write_layer(&upstream, &LayerFixture::default());
        git.publish(URL, "main", &upstream);

        let imported = store.import(URL, None).await.unwrap();
        let found = store.find(&imported.identity).unwrap();
        assert_eq!(found.path, imported.path);
        assert_eq!(found.origin, imported.origin);
    }
}
