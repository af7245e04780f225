//! Test doubles for the git transport and the image customizer.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use osconfig_core::error::{OsConfigError, Result};

use crate::apply::ImageCustomizer;
use crate::fetch::GitTransport;
use crate::fs::copy_dir_recursive;

/// Contents of a layer written by [`write_layer`].
#[derive(Debug, Default, Clone)]
pub(crate) struct LayerFixture {
    pub configs: Vec<(&'static str, &'static str)>,
    pub rpm: Vec<&'static str>,
    pub deb: Vec<&'static str>,
    pub pip: Vec<&'static str>,
    pub scripts: Vec<(&'static str, &'static str)>,
}

/// Write a valid layer directory at `root`.
pub(crate) fn write_layer(root: &Path, fixture: &LayerFixture) {
    crate::store::layout::create_skeleton(root).unwrap();
    for (rel, content) in &fixture.configs {
        let path = root.join("configs").join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    let lists = [
        ("rpm-requirements.txt", &fixture.rpm),
        ("dpm-requirements.txt", &fixture.deb),
        ("pip-requirements.txt", &fixture.pip),
    ];
    for (file, entries) in lists {
        let mut content = entries.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        std::fs::write(root.join("package-lists").join(file), content).unwrap();
    }
    for (name, body) in &fixture.scripts {
        std::fs::write(root.join("scripts").join(name), body).unwrap();
    }
}

/// In-memory git remote: published (url, branch) pairs map to local
/// directories that are copied on clone.
#[derive(Default)]
pub(crate) struct FakeGit {
    published: Mutex<HashMap<(String, String), PathBuf>>,
    clones: Mutex<HashMap<PathBuf, PathBuf>>,
    ls_remotes: AtomicUsize,
    clone_count: AtomicUsize,
    pulls: AtomicUsize,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, url: &str, branch: &str, source: &Path) {
        self.published
            .lock()
            .unwrap()
            .insert((url.to_string(), branch.to_string()), source.to_path_buf());
    }

    pub fn ls_remote_count(&self) -> usize {
        self.ls_remotes.load(Ordering::SeqCst)
    }

    pub fn clone_count(&self) -> usize {
        self.clone_count.load(Ordering::SeqCst)
    }

    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GitTransport for FakeGit {
    async fn ref_exists(&self, url: &str, reference: &str) -> Result<bool> {
        self.ls_remotes.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .published
            .lock()
            .unwrap()
            .contains_key(&(url.to_string(), reference.to_string())))
    }

    async fn clone_ref(&self, url: &str, reference: &str, dest: &Path) -> Result<()> {
        self.clone_count.fetch_add(1, Ordering::SeqCst);
        let source = self
            .published
            .lock()
            .unwrap()
            .get(&(url.to_string(), reference.to_string()))
            .cloned()
            .ok_or_else(|| OsConfigError::RemoteNotFound {
                url: url.to_string(),
                tried: vec![reference.to_string()],
            })?;
        // Give concurrent callers a chance to race on the same key
        tokio::task::yield_now().await;
        copy_dir_recursive(&source, dest)?;
        self.clones
            .lock()
            .unwrap()
            .insert(dest.to_path_buf(), source);
        Ok(())
    }

    async fn pull(&self, repo: &Path) -> Result<()> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let source = self.clones.lock().unwrap().get(repo).cloned();
        match source {
            Some(source) => copy_dir_recursive(&source, repo),
            None => Err(OsConfigError::CommandFailed {
                command: format!("git -C {} pull", repo.display()),
                status: 1,
                stderr: "not a clone".to_string(),
            }),
        }
    }
}

/// One call made against a [`RecordingCustomizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Upload {
        image: PathBuf,
        dest: String,
        content: Vec<u8>,
    },
    Run {
        image: PathBuf,
        command: String,
    },
    Exists {
        image: PathBuf,
        path: String,
    },
    Capture {
        image: PathBuf,
        command: String,
    },
}

/// Customizer that records every call. Marker files listed in `existing`
/// are reported present; commands containing `fail_on` fail.
#[derive(Default)]
pub(crate) struct RecordingCustomizer {
    pub existing: HashSet<String>,
    pub fail_on: Option<String>,
    /// Canned `capture` output, keyed by a command substring
    pub outputs: Vec<(String, String)>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingCustomizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str) -> Self {
        self.existing.insert(path.to_string());
        self
    }

    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub fn with_output(mut self, needle: &str, stdout: &str) -> Self {
        self.outputs.push((needle.to_string(), stdout.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands passed to `run`, in order.
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Run { command, .. } => Some(command),
                _ => None,
            })
            .collect()
    }

    fn check_failure(&self, command: &str) -> Result<()> {
        match &self.fail_on {
            Some(needle) if command.contains(needle.as_str()) => {
                Err(OsConfigError::CommandFailed {
                    command: command.to_string(),
                    status: 1,
                    stderr: "simulated failure".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Content uploaded to `dest`, if any.
    pub fn uploaded(&self, dest: &str) -> Option<Vec<u8>> {
        self.calls().into_iter().find_map(|c| match c {
            Call::Upload {
                dest: d, content, ..
            } if d == dest => Some(content),
            _ => None,
        })
    }
}

#[async_trait]
impl ImageCustomizer for RecordingCustomizer {
    async fn upload(&self, image: &Path, source: &Path, dest: &str) -> Result<()> {
        let content = std::fs::read(source)?;
        self.calls.lock().unwrap().push(Call::Upload {
            image: image.to_path_buf(),
            dest: dest.to_string(),
            content,
        });
        Ok(())
    }

    async fn run(&self, image: &Path, command: &str) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Run {
            image: image.to_path_buf(),
            command: command.to_string(),
        });
        self.check_failure(command)
    }

    async fn file_exists(&self, image: &Path, path: &str) -> Result<bool> {
        self.calls.lock().unwrap().push(Call::Exists {
            image: image.to_path_buf(),
            path: path.to_string(),
        });
        Ok(self.existing.contains(path))
    }

    async fn capture(&self, image: &Path, command: &str) -> Result<String> {
        self.calls.lock().unwrap().push(Call::Capture {
            image: image.to_path_buf(),
            command: command.to_string(),
        });
        self.check_failure(command)?;
        Ok(self
            .outputs
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, stdout)| stdout.clone())
            .unwrap_or_default())
    }
}
