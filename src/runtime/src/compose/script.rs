//! Squashed script generation.
//!
//! Every layer script becomes a bash function named after its layer and file,
//! called right after its definition. An `ERR` trap at the top names the
//! failing function and aborts the whole script.

use osconfig_core::error::{OsConfigError, Result};
use osconfig_core::layer::Layer;

use crate::fs::list_files;

/// Prologue of every generated script.
pub const SCRIPT_HEADER: &str = "#!/bin/bash\n\
set -eE -o pipefail\n\
trap 'status=$?; echo \"osconfig: layer script ${FUNCNAME[0]:-main} failed with status ${status}\" >&2; exit ${status}' ERR\n";

/// Generated script plus the functions it calls, in call order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedScript {
    pub text: String,
    pub functions: Vec<String>,
}

/// `<layer>_<file>` with everything outside `[A-Za-z0-9_]` mapped to `_`.
pub fn function_name(layer: &str, script: &str) -> String {
    format!("{}_{}", layer, script)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Drop full-line comments (including a shebang) and blank lines.
pub fn strip_comments(body: &str) -> String {
    let mut out = String::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Linearize all layer scripts, layer order first, then file name order.
pub fn generate(layers: &[Layer]) -> Result<GeneratedScript> {
    let mut script = GeneratedScript {
        text: SCRIPT_HEADER.to_string(),
        functions: Vec::new(),
    };

    for layer in layers {
        let scripts_dir = layer.scripts_dir();
        for relative in list_files(&scripts_dir)? {
            let path = scripts_dir.join(&relative);
            let body = std::fs::read_to_string(&path).map_err(|e| {
                OsConfigError::InvalidLayerStructure {
                    path: layer.path.display().to_string(),
                    reason: format!("cannot read script {}: {}", path.display(), e),
                }
            })?;

            let name = function_name(&layer.name, &relative.to_string_lossy());
            let mut body = strip_comments(&body);
            if body.is_empty() {
                body.push_str(":\n");
            }

            script.text.push('\n');
            script.text.push_str(&format!("{}() {{\n{}}}\n{}\n", name, body, name));
            script.functions.push(name);
        }
    }

    Ok(script)
}
