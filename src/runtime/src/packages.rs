//! Offline package download, repository creation and image inventory.
//!
//! Used to prepare package mirrors for images built without network access.
//! RPM downloads go through `dnf download`, Python packages through
//! `pip download`. Debian downloads are not supported.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use osconfig_core::error::{OsConfigError, Result};
use osconfig_core::layer::RequirementKind;

use crate::apply::applier::{DEB_MARKER, RPM_MARKER};
use crate::apply::ImageCustomizer;
use crate::process::run_checked;

/// Downloads requirement lists (with dependencies) into a directory.
#[derive(Debug, Clone)]
pub struct PackageDownloader {
    /// Python interpreter used for `pip download`
    runtime: String,
    timeout: Duration,
}

impl PackageDownloader {
    pub fn new(runtime: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runtime: runtime.into(),
            timeout,
        }
    }

    /// Download `packages` of `kind` into `dest`, creating it if needed.
    pub async fn download(
        &self,
        kind: RequirementKind,
        packages: &[String],
        dest: &Path,
    ) -> Result<()> {
        if kind == RequirementKind::Deb {
            return Err(OsConfigError::Unsupported(
                "downloading deb packages is not supported".to_string(),
            ));
        }
        if packages.is_empty() {
            tracing::info!(kind = %kind, "No packages to download");
            return Ok(());
        }

        std::fs::create_dir_all(dest).map_err(|e| {
            OsConfigError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create download directory {}: {}", dest.display(), e),
            ))
        })?;

        if kind == RequirementKind::Rpm {
            self.download_rpm(packages, dest).await?;
        } else {
            self.download_pip(packages, dest).await?;
        }

        tracing::info!(
            kind = %kind,
            count = packages.len(),
            dest = %dest.display(),
            "Downloaded packages"
        );
        Ok(())
    }

    async fn download_rpm(&self, packages: &[String], dest: &Path) -> Result<()> {
        // Throw-away dnf config, removed on drop
        let mut config = tempfile::Builder::new()
            .prefix("osconfig-dnf-")
            .suffix(".conf")
            .tempfile()?;
        config.write_all(b"[main]\ngpgcheck=0\n")?;
        config.flush()?;

        let mut args = vec![
            "download".to_string(),
            "--alldeps".to_string(),
            "--resolve".to_string(),
            "--destdir".to_string(),
            dest.to_string_lossy().into_owned(),
            "--config".to_string(),
            config.path().to_string_lossy().into_owned(),
        ];
        args.extend(packages.iter().cloned());
        run_checked("dnf", &args, None, self.timeout).await?;
        Ok(())
    }

    async fn download_pip(&self, packages: &[String], dest: &Path) -> Result<()> {
        let mut args = vec![
            "-m".to_string(),
            "pip".to_string(),
            "download".to_string(),
            "-d".to_string(),
            dest.to_string_lossy().into_owned(),
        ];
        args.extend(packages.iter().cloned());
        run_checked(&self.runtime, &args, None, self.timeout).await?;
        Ok(())
    }
}

/// Turn a directory of downloaded packages into a local repository.
pub async fn create_repo(dir: &Path, kind: RequirementKind, timeout: Duration) -> Result<()> {
    if !dir.is_dir() {
        return Err(OsConfigError::SourceNotFound(dir.display().to_string()));
    }

    match kind {
        RequirementKind::Rpm => {
            let args = vec![dir.to_string_lossy().into_owned()];
            run_checked("createrepo", &args, None, timeout).await?;
        }
        RequirementKind::Deb => {
            let args = vec![".".to_string(), "/dev/null".to_string()];
            let output = run_checked("dpkg-scanpackages", &args, Some(dir), timeout).await?;
            std::fs::write(dir.join("Packages"), output.stdout)?;

            let args = vec!["-k".to_string(), "-f".to_string(), "Packages".to_string()];
            run_checked("gzip", &args, Some(dir), timeout).await?;
        }
        RequirementKind::Pip => {
            return Err(OsConfigError::Unsupported(
                "pip repositories are plain download directories".to_string(),
            ))
        }
    }

    tracing::info!(kind = %kind, dir = %dir.display(), "Created package repository");
    Ok(())
}

/// List the packages installed in an image and the family they belong to.
///
/// The family is detected from the same marker files the applier uses. RPM
/// entries are `rpm -qa` names, Debian entries `name=version` from the
/// installed (`ii`) lines of `dpkg -l`. The list is sorted.
pub async fn list_installed(
    customizer: &dyn ImageCustomizer,
    image: &Path,
) -> Result<(Vec<String>, RequirementKind)> {
    let (kind, mut packages) = if customizer.file_exists(image, RPM_MARKER).await? {
        let stdout = customizer.capture(image, "rpm -qa").await?;
        (RequirementKind::Rpm, parse_rpm_list(&stdout))
    } else if customizer.file_exists(image, DEB_MARKER).await? {
        let stdout = customizer.capture(image, "dpkg -l").await?;
        (RequirementKind::Deb, parse_dpkg_list(&stdout))
    } else {
        return Err(OsConfigError::Unsupported(format!(
            "{}: no rpm or dpkg package database found",
            image.display()
        )));
    };
    packages.sort();

    tracing::info!(
        image = %image.display(),
        kind = %kind,
        count = packages.len(),
        "Listed installed packages"
    );
    Ok((packages, kind))
}

fn parse_rpm_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_dpkg_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| line.starts_with("ii"))
        .filter_map(|line| {
            let mut fields = line.split_whitespace().skip(1);
            match (fields.next(), fields.next()) {
                (Some(name), Some(version)) => Some(format!("{}={}", name, version)),
                _ => None,
            }
        })
        .collect()
}
