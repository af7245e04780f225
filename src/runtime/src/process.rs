//! Bounded execution of external tools.
//!
//! Every host command (git, virt-customize, guestfish, dnf, pip) goes through
//! here so that a hung tool is killed and reported as a timeout.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use osconfig_core::error::{OsConfigError, Result};
use tokio::process::Command;

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, or -1 if terminated by signal
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Render a command line for logs and error messages.
pub fn describe(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Run a command and capture its output, whatever its exit status.
///
/// The child is killed if it outlives `timeout`.
pub async fn run_command(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput> {
    let command_line = describe(program, args);
    tracing::debug!(command = %command_line, "Running command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn().map_err(|e| OsConfigError::CommandFailed {
        command: command_line.clone(),
        status: -1,
        stderr: format!("failed to spawn {}: {}", program, e),
    })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(OsConfigError::TimeoutError(format!(
                "'{}' did not finish within {}s",
                command_line,
                timeout.as_secs()
            )))
        }
    };

    Ok(CommandOutput {
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run a command, failing on a non-zero exit status.
pub async fn run_checked(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput> {
    let output = run_command(program, args, cwd, timeout).await?;
    if !output.success() {
        return Err(OsConfigError::CommandFailed {
            command: describe(program, args),
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}
