//! GitTransport - raw repository transport capability.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use osconfig_core::error::{OsConfigError, Result};

use crate::process::{describe, run_checked, run_command};

/// Trait for git transport implementations.
///
/// The fetcher owns caching, keying and fallback; a transport only talks to
/// the remote.
#[async_trait]
pub trait GitTransport: Send + Sync {
    /// Whether `reference` exists upstream as a branch or tag.
    async fn ref_exists(&self, url: &str, reference: &str) -> Result<bool>;

    /// Clone `url` at `reference` into `dest`, which must not exist yet.
    async fn clone_ref(&self, url: &str, reference: &str, dest: &Path) -> Result<()>;

    /// Fast-forward an existing clone.
    async fn pull(&self, repo: &Path) -> Result<()>;
}

/// Transport backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    timeout: Duration,
}

impl GitCli {
    /// Create a transport whose every invocation is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "git".to_string(),
            timeout,
        }
    }

    /// Use a different git executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl GitTransport for GitCli {
    async fn ref_exists(&self, url: &str, reference: &str) -> Result<bool> {
        let args = vec![
            "ls-remote".to_string(),
            "--exit-code".to_string(),
            "--heads".to_string(),
            "--tags".to_string(),
            url.to_string(),
            reference.to_string(),
        ];
        let output = run_command(&self.program, &args, None, self.timeout).await?;

        // ls-remote --exit-code exits 2 when nothing matched
        match output.status {
            0 => Ok(true),
            2 => Ok(false),
            status => Err(OsConfigError::CommandFailed {
                command: describe(&self.program, &args),
                status,
                stderr: output.stderr.trim().to_string(),
            }),
        }
    }

    async fn clone_ref(&self, url: &str, reference: &str, dest: &Path) -> Result<()> {
        let args = vec![
            "clone".to_string(),
            "--quiet".to_string(),
            "--branch".to_string(),
            reference.to_string(),
            "--".to_string(),
            url.to_string(),
            dest.to_string_lossy().into_owned(),
        ];
        run_checked(&self.program, &args, None, self.timeout).await?;
        Ok(())
    }

    async fn pull(&self, repo: &Path) -> Result<()> {
        let args = vec![
            "-C".to_string(),
            repo.to_string_lossy().into_owned(),
            "pull".to_string(),
            "--quiet".to_string(),
            "--ff-only".to_string(),
        ];
        run_checked(&self.program, &args, None, self.timeout).await?;
        Ok(())
    }
}
