//! ImageCustomizer - offline disk image manipulation capability.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use osconfig_core::error::{OsConfigError, Result};

use crate::process::{describe, run_checked};

/// Trait for image customizer implementations.
#[async_trait]
pub trait ImageCustomizer: Send + Sync {
    /// Copy a host file into the image at `dest` (a file path, or a
    /// directory the file keeps its name in).
    async fn upload(&self, image: &Path, source: &Path, dest: &str) -> Result<()>;

    /// Run a shell command inside the image.
    async fn run(&self, image: &Path, command: &str) -> Result<()>;

    /// Whether `path` exists inside the image.
    async fn file_exists(&self, image: &Path, path: &str) -> Result<bool>;

    /// Run a shell command against a read-only view of the image and
    /// return its standard output.
    async fn capture(&self, image: &Path, command: &str) -> Result<String>;
}

/// Customizer backed by libguestfs (`virt-customize` and `guestfish`).
#[derive(Debug, Clone)]
pub struct VirtCustomize {
    timeout: Duration,
}

impl VirtCustomize {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn customize(&self, image: &Path, op: &str, value: String) -> Result<()> {
        let args = vec![
            "-a".to_string(),
            image.to_string_lossy().into_owned(),
            op.to_string(),
            value,
        ];
        run_checked("virt-customize", &args, None, self.timeout).await?;
        Ok(())
    }
}

#[async_trait]
impl ImageCustomizer for VirtCustomize {
    async fn upload(&self, image: &Path, source: &Path, dest: &str) -> Result<()> {
        self.customize(
            image,
            "--upload",
            format!("{}:{}", source.to_string_lossy(), dest),
        )
        .await
    }

    async fn run(&self, image: &Path, command: &str) -> Result<()> {
        self.customize(image, "--run-command", command.to_string())
            .await
    }

    async fn file_exists(&self, image: &Path, path: &str) -> Result<bool> {
        let args = guestfish_args(image, "exists", path);
        let output = run_checked("guestfish", &args, None, self.timeout).await?;
        match output.stdout.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(OsConfigError::CommandFailed {
                command: describe("guestfish", &args),
                status: output.status,
                stderr: format!("unexpected output: {}", other),
            }),
        }
    }

    async fn capture(&self, image: &Path, command: &str) -> Result<String> {
        let args = guestfish_args(image, "sh", command);
        let output = run_checked("guestfish", &args, None, self.timeout).await?;
        Ok(output.stdout)
    }
}

/// `guestfish --ro -a <image> -i <op> <arg>`
fn guestfish_args(image: &Path, op: &str, arg: &str) -> Vec<String> {
    vec![
        "--ro".to_string(),
        "-a".to_string(),
        image.to_string_lossy().into_owned(),
        "-i".to_string(),
        op.to_string(),
        arg.to_string(),
    ]
}
