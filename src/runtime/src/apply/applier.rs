//! ImageApplier - applies a composed artifact to a copy of a base image.
//!
//! The base image is never touched. Work happens on `<output>.partial`, which
//! is renamed to the output path only after every step succeeded, and removed
//! on failure or when the apply future is dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use osconfig_core::apply::{ApplyState, StepOrder};
use osconfig_core::config::OsConfig;
use osconfig_core::error::{OsConfigError, Result};
use osconfig_core::layer::RequirementKind;
use serde::Serialize;

use super::customizer::ImageCustomizer;
use crate::compose::ComposedArtifact;

/// File name of the config archive uploaded to the image root.
pub const ARCHIVE_NAME: &str = "osconfig-configs.tar.gz";

/// Marker file identifying RPM-based images.
pub const RPM_MARKER: &str = "/etc/redhat-release";

/// Marker file identifying Debian-based images.
pub const DEB_MARKER: &str = "/etc/debian_version";

/// Settings for one apply run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Interpreter used to create the venv (e.g. "python3", "python3.11")
    pub runtime_version: String,
    /// In-image venv prefix
    pub runtime_prefix: String,
    /// In-image path of the squashed script
    pub script_path: String,
    pub step_order: StepOrder,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            runtime_version: "python3".to_string(),
            runtime_prefix: "/opt/os-python-venv".to_string(),
            script_path: "/opt/squashed_script.sh".to_string(),
            step_order: StepOrder::default(),
        }
    }
}

impl ApplyOptions {
    pub fn from_config(config: &OsConfig) -> Self {
        Self {
            runtime_version: config.runtime_version.clone(),
            runtime_prefix: config.runtime_prefix.clone(),
            script_path: config.script_path.clone(),
            step_order: config.step_order,
        }
    }
}

/// Outcome of a successful apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub output: PathBuf,
    /// States passed through, in order
    pub states: Vec<ApplyState>,
    /// Package families installed
    pub installed: Vec<RequirementKind>,
    /// Package families skipped because the image is of another flavor
    pub skipped: Vec<RequirementKind>,
}

/// Removes the partial output unless disarmed.
struct PartialOutput {
    path: PathBuf,
    armed: bool,
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove partial image");
            }
        }
    }
}

/// Applies composed artifacts through an [`ImageCustomizer`].
pub struct ImageApplier {
    customizer: Arc<dyn ImageCustomizer>,
    options: ApplyOptions,
}

impl ImageApplier {
    pub fn new(customizer: Arc<dyn ImageCustomizer>, options: ApplyOptions) -> Self {
        Self {
            customizer,
            options,
        }
    }

    pub fn options(&self) -> &ApplyOptions {
        &self.options
    }

    /// Apply `artifact` to a copy of `base`, producing `output`.
    pub async fn apply(
        &self,
        base: &Path,
        artifact: &ComposedArtifact,
        output: &Path,
    ) -> Result<ApplyReport> {
        if !base.is_file() {
            return Err(OsConfigError::ImageNotFound(base.display().to_string()));
        }
        if same_file(base, output) {
            return Err(OsConfigError::InvalidPath(format!(
                "output {} must differ from the base image",
                output.display()
            )));
        }
        if same_file(base, &partial_path(output)) {
            return Err(OsConfigError::InvalidPath(format!(
                "base image {} is the working copy of output {}",
                base.display(),
                output.display()
            )));
        }

        let mut report = ApplyReport {
            output: output.to_path_buf(),
            states: Vec::new(),
            installed: Vec::new(),
            skipped: Vec::new(),
        };

        // Staged
        let mut partial = PartialOutput {
            path: partial_path(output),
            armed: true,
        };
        tracing::info!(
            base = %base.display(),
            output = %output.display(),
            "Copying base image"
        );
        tokio::fs::copy(base, &partial.path)
            .await
            .map_err(|e| OsConfigError::apply(ApplyState::Staged, e))?;
        let image = partial.path.clone();

        let staging = tempfile::Builder::new()
            .prefix("osconfig-apply-")
            .tempdir()
            .map_err(|e| OsConfigError::apply(ApplyState::Staged, e))?;
        let archive = staging.path().join(ARCHIVE_NAME);
        let script = staging.path().join("squashed_script.sh");
        let has_configs = !artifact.configs.is_empty();
        if has_configs {
            artifact
                .write_archive(&archive)
                .map_err(|e| OsConfigError::apply(ApplyState::Staged, e))?;
        }
        if artifact.has_script() {
            artifact
                .write_script(&script)
                .map_err(|e| OsConfigError::apply(ApplyState::Staged, e))?;
        }
        report.states.push(ApplyState::Staged);

        // Uploaded
        if has_configs {
            self.customizer
                .upload(&image, &archive, "/")
                .await
                .map_err(|e| OsConfigError::apply(ApplyState::Uploaded, e))?;
        }
        if artifact.has_script() {
            self.customizer
                .upload(&image, &script, &self.options.script_path)
                .await
                .map_err(|e| OsConfigError::apply(ApplyState::Uploaded, e))?;
        }
        report.states.push(ApplyState::Uploaded);

        // ConfigsExtracted
        if has_configs {
            let command = format!(
                "tar xzf /{name} -C / && rm -f /{name}",
                name = ARCHIVE_NAME
            );
            self.customizer
                .run(&image, &command)
                .await
                .map_err(|e| OsConfigError::apply(ApplyState::ConfigsExtracted, e))?;
            tracing::info!(files = artifact.configs.len(), "Extracted configs into image");
        }
        report.states.push(ApplyState::ConfigsExtracted);

        match self.options.step_order {
            StepOrder::ScriptsFirst => {
                self.run_script(&image, artifact, &mut report).await?;
                self.install_packages(&image, artifact, &mut report).await?;
            }
            StepOrder::PackagesFirst => {
                self.install_packages(&image, artifact, &mut report).await?;
                self.run_script(&image, artifact, &mut report).await?;
            }
        }

        // Finalized
        tokio::fs::rename(&image, output)
            .await
            .map_err(|e| OsConfigError::apply(ApplyState::Finalized, e))?;
        partial.armed = false;
        report.states.push(ApplyState::Finalized);

        tracing::info!(output = %output.display(), "Applied layers to image");
        Ok(report)
    }

    async fn run_script(
        &self,
        image: &Path,
        artifact: &ComposedArtifact,
        report: &mut ApplyReport,
    ) -> Result<()> {
        if artifact.has_script() {
            let path = &self.options.script_path;
            let command = format!("chmod +x {path} && {path}", path = shell_quote(path));
            self.customizer
                .run(image, &command)
                .await
                .map_err(|e| OsConfigError::apply(ApplyState::ScriptRun, e))?;
            tracing::info!(functions = artifact.functions.len(), "Ran layer scripts");
        }
        report.states.push(ApplyState::ScriptRun);
        Ok(())
    }

    async fn install_packages(
        &self,
        image: &Path,
        artifact: &ComposedArtifact,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let fail = |e: OsConfigError| OsConfigError::apply(ApplyState::PackagesInstalled, e);

        for (kind, marker) in [
            (RequirementKind::Rpm, RPM_MARKER),
            (RequirementKind::Deb, DEB_MARKER),
        ] {
            let packages = artifact.requirements(kind);
            if packages.is_empty() {
                continue;
            }
            if !self
                .customizer
                .file_exists(image, marker)
                .await
                .map_err(fail)?
            {
                tracing::warn!(
                    kind = %kind,
                    count = packages.len(),
                    marker = marker,
                    "Image is not of this package flavor, skipping requirements"
                );
                report.skipped.push(kind);
                continue;
            }

            let command = match kind {
                RequirementKind::Rpm => format!("dnf install -y {}", join_quoted(packages)),
                _ => format!(
                    "DEBIAN_FRONTEND=noninteractive apt-get install -y {}",
                    join_quoted(packages)
                ),
            };
            self.customizer.run(image, &command).await.map_err(fail)?;
            tracing::info!(kind = %kind, count = packages.len(), "Installed packages");
            report.installed.push(kind);
        }

        let pip = artifact.requirements(RequirementKind::Pip);
        if !pip.is_empty() {
            let prefix = shell_quote(&self.options.runtime_prefix);
            let commands = [
                format!(
                    "{} -m venv {}",
                    shell_quote(&self.options.runtime_version),
                    prefix
                ),
                format!(
                    "{}/bin/pip install {}",
                    prefix,
                    join_quoted(pip)
                ),
                format!("chmod -R 777 {}", prefix),
            ];
            for command in &commands {
                self.customizer.run(image, command).await.map_err(fail)?;
            }
            tracing::info!(
                count = pip.len(),
                prefix = %self.options.runtime_prefix,
                "Installed runtime packages"
            );
            report.installed.push(RequirementKind::Pip);
        }

        report.states.push(ApplyState::PackagesInstalled);
        Ok(())
    }
}

/// `<output>.partial` next to the output.
fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Quote a word for `sh` unless it is made of plain characters only.
pub(crate) fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

fn join_quoted(words: &[String]) -> String {
    words
        .iter()
        .map(|w| shell_quote(w))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Composer;
    use crate::testing::{write_layer, Call, LayerFixture, RecordingCustomizer};
    use osconfig_core::layer::{Layer, LayerOrigin};
    use tempfile::TempDir;

    fn artifact(tmp: &TempDir, fixture: LayerFixture) -> ComposedArtifact {
        let path = tmp.path().join("layer");
        write_layer(&path, &fixture);
        let layer = Layer {
            name: "base".to_string(),
            identity: "base".to_string(),
            path,
            origin: LayerOrigin::Local,
        };
        Composer::new().squash(&[layer]).unwrap()
    }

    fn base_image(tmp: &TempDir) -> PathBuf {
        let base = tmp.path().join("base.qcow2");
        std::fs::write(&base, b"QFI\xfbimage").unwrap();
        base
    }

    fn applier(customizer: Arc<RecordingCustomizer>) -> ImageApplier {
        ImageApplier::new(customizer, ApplyOptions::default())
    }

    #[tokio::test]
    async fn test_missing_base_fails_without_output() {
        let tmp = TempDir::new().unwrap();
        let customizer = Arc::new(RecordingCustomizer::new());
        let output = tmp.path().join("out.qcow2");

        let result = applier(customizer.clone())
            .apply(
                &tmp.path().join("missing.qcow2"),
                &artifact(&tmp, LayerFixture::default()),
                &output,
            )
            .await;

        assert!(matches!(result, Err(OsConfigError::ImageNotFound(_))));
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
        assert!(customizer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_config_only_apply() {
        let tmp = TempDir::new().unwrap();
        let base = base_image(&tmp);
        let output = tmp.path().join("out.qcow2");
        let customizer = Arc::new(RecordingCustomizer::new());
        let artifact = artifact(
            &tmp,
            LayerFixture {
                configs: vec![("etc/app.conf", "port = 80")],
                ..Default::default()
            },
        );

        let report = applier(customizer.clone())
            .apply(&base, &artifact, &output)
            .await
            .unwrap();

        assert_eq!(
            report.states,
            vec![
                ApplyState::Staged,
                ApplyState::Uploaded,
                ApplyState::ConfigsExtracted,
                ApplyState::ScriptRun,
                ApplyState::PackagesInstalled,
                ApplyState::Finalized,
            ]
        );
        assert!(report.installed.is_empty());
        assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&base).unwrap());
        assert!(!partial_path(&output).exists());

        assert!(customizer.uploaded("/").is_some());
        assert_eq!(
            customizer.commands(),
            vec![format!("tar xzf /{0} -C / && rm -f /{0}", ARCHIVE_NAME)]
        );
        for call in customizer.calls() {
            match call {
                Call::Upload { image, .. }
                | Call::Run { image, .. }
                | Call::Exists { image, .. }
                | Call::Capture { image, .. } => assert_eq!(image, partial_path(&output)),
            }
        }
    }

    #[tokio::test]
    async fn test_script_and_packages() {
        let tmp = TempDir::new().unwrap();
        let base = base_image(&tmp);
        let output = tmp.path().join("out.qcow2");
        let customizer = Arc::new(RecordingCustomizer::new().with_file(RPM_MARKER));
        let artifact = artifact(
            &tmp,
            LayerFixture {
                rpm: vec!["git", "curl"],
                deb: vec!["vim"],
                pip: vec!["requests>=2"],
                scripts: vec![("setup.sh", "echo hi")],
                ..Default::default()
            },
        );

        let report = applier(customizer.clone())
            .apply(&base, &artifact, &output)
            .await
            .unwrap();

        assert_eq!(report.installed, vec![RequirementKind::Rpm, RequirementKind::Pip]);
        assert_eq!(report.skipped, vec![RequirementKind::Deb]);

        let script = customizer.uploaded("/opt/squashed_script.sh").unwrap();
        assert_eq!(String::from_utf8(script).unwrap(), artifact.script);
        assert!(customizer.uploaded("/").is_none());

        assert_eq!(
            customizer.commands(),
            vec![
                "chmod +x /opt/squashed_script.sh && /opt/squashed_script.sh".to_string(),
                "dnf install -y git curl".to_string(),
                "python3 -m venv /opt/os-python-venv".to_string(),
                "/opt/os-python-venv/bin/pip install 'requests>=2'".to_string(),
                "chmod -R 777 /opt/os-python-venv".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_deb_image() {
        let tmp = TempDir::new().unwrap();
        let base = base_image(&tmp);
        let output = tmp.path().join("out.qcow2");
        let customizer = Arc::new(RecordingCustomizer::new().with_file(DEB_MARKER));
        let artifact = artifact(
            &tmp,
            LayerFixture {
                rpm: vec!["git"],
                deb: vec!["git"],
                ..Default::default()
            },
        );

        let report = applier(customizer.clone())
            .apply(&base, &artifact, &output)
            .await
            .unwrap();

        assert_eq!(report.installed, vec![RequirementKind::Deb]);
        assert_eq!(report.skipped, vec![RequirementKind::Rpm]);
        assert_eq!(
            customizer.commands(),
            vec!["DEBIAN_FRONTEND=noninteractive apt-get install -y git".to_string()]
        );
    }

    #[tokio::test]
    async fn test_packages_first_order() {
        let tmp = TempDir::new().unwrap();
        let base = base_image(&tmp);
        let output = tmp.path().join("out.qcow2");
        let customizer = Arc::new(RecordingCustomizer::new().with_file(RPM_MARKER));
        let artifact = artifact(
            &tmp,
            LayerFixture {
                rpm: vec!["git"],
                scripts: vec![("setup.sh", "echo hi")],
                ..Default::default()
            },
        );
        let options = ApplyOptions {
            step_order: StepOrder::PackagesFirst,
            ..Default::default()
        };

        let report = ImageApplier::new(customizer.clone(), options)
            .apply(&base, &artifact, &output)
            .await
            .unwrap();

        let commands = customizer.commands();
        assert!(commands[0].starts_with("dnf install"));
        assert!(commands[1].starts_with("chmod +x"));
        assert_eq!(report.states[3], ApplyState::PackagesInstalled);
        assert_eq!(report.states[4], ApplyState::ScriptRun);
    }

    #[tokio::test]
    async fn test_script_failure_reports_state_and_cleans_up() {
        let tmp = TempDir::new().unwrap();
        let base = base_image(&tmp);
        let output = tmp.path().join("out.qcow2");
        let customizer = Arc::new(
            RecordingCustomizer::new()
                .with_file(RPM_MARKER)
                .failing_on("squashed_script"),
        );
        let artifact = artifact(
            &tmp,
            LayerFixture {
                rpm: vec!["git"],
                scripts: vec![("setup.sh", "false")],
                ..Default::default()
            },
        );

        let result = applier(customizer.clone())
            .apply(&base, &artifact, &output)
            .await;

        match result {
            Err(OsConfigError::ApplyFailed { state, cause }) => {
                assert_eq!(state, ApplyState::ScriptRun);
                assert!(cause.contains("simulated failure"));
            }
            other => panic!("expected ApplyFailed, got {:?}", other),
        }
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
        assert!(base.exists());
        assert!(!customizer.commands().iter().any(|c| c.starts_with("dnf")));
    }

    #[tokio::test]
    async fn test_package_failure_state() {
        let tmp = TempDir::new().unwrap();
        let base = base_image(&tmp);
        let output = tmp.path().join("out.qcow2");
        let customizer = Arc::new(RecordingCustomizer::new().failing_on("venv"));
        let artifact = artifact(
            &tmp,
            LayerFixture {
                pip: vec!["requests"],
                ..Default::default()
            },
        );

        let result = applier(customizer).apply(&base, &artifact, &output).await;
        assert!(matches!(
            result,
            Err(OsConfigError::ApplyFailed {
                state: ApplyState::PackagesInstalled,
                ..
            })
        ));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_output_equal_to_base_rejected() {
        let tmp = TempDir::new().unwrap();
        let base = base_image(&tmp);
        let customizer = Arc::new(RecordingCustomizer::new());

        let result = applier(customizer)
            .apply(&base, &artifact(&tmp, LayerFixture::default()), &base)
            .await;
        assert!(matches!(result, Err(OsConfigError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_base_as_partial_output_rejected() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("img.qcow2");
        let base = partial_path(&output);
        std::fs::write(&base, b"BASEIMAGE").unwrap();
        let customizer = Arc::new(RecordingCustomizer::new().failing_on("tar"));
        let artifact = artifact(
            &tmp,
            LayerFixture {
                configs: vec![("etc/app.conf", "port = 80")],
                ..Default::default()
            },
        );

        let result = applier(customizer.clone())
            .apply(&base, &artifact, &output)
            .await;

        assert!(matches!(result, Err(OsConfigError::InvalidPath(_))));
        assert_eq!(std::fs::read(&base).unwrap(), b"BASEIMAGE");
        assert!(!output.exists());
        assert!(customizer.calls().is_empty());
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("git"), "git");
        assert_eq!(shell_quote("pkg==1.0"), "pkg==1.0");
        assert_eq!(shell_quote("a>b"), "'a>b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/images/out.qcow2")),
            PathBuf::from("/images/out.qcow2.partial")
        );
    }
}
