//! `osconfig squash` command: resolve a recipe and show the merged result.
//!
//! Optionally writes the config archive and the generated script so they
//! can be inspected or applied by other tooling.

use std::path::{Path, PathBuf};

use clap::Args;
use osconfig_core::{OsConfig, RequirementKind};

use crate::output;

#[derive(Args)]
pub struct SquashArgs {
    /// Recipe file (TOML)
    pub recipe: PathBuf,

    /// Print the squashed artifact as JSON
    #[arg(long)]
    pub json: bool,

    /// Write the merged config tree as a tar.gz
    #[arg(long, value_name = "FILE")]
    pub archive: Option<PathBuf>,

    /// Write the generated script
    #[arg(long, value_name = "FILE")]
    pub script: Option<PathBuf>,
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

pub async fn execute(args: SquashArgs, config: &OsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let artifact = super::squash_recipe(config, &args.recipe).await?;

    if let Some(path) = &args.archive {
        ensure_parent(path)?;
        let info = artifact.write_archive(path)?;
        if !args.json {
            println!(
                "Wrote {} ({} files, {}, sha256:{})",
                info.path.display(),
                info.entries,
                output::format_bytes(info.size),
                info.digest
            );
        }
    }
    if let Some(path) = &args.script {
        ensure_parent(path)?;
        artifact.write_script(path)?;
        if !args.json {
            println!("Wrote {}", path.display());
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&artifact)?);
        return Ok(());
    }

    println!("Layers: {}", artifact.layers.join(" -> "));
    println!();

    let mut table = output::new_table(&["KIND", "PACKAGES"]);
    for kind in RequirementKind::ALL {
        table.add_row([
            kind.to_string(),
            output::format_packages(artifact.requirements(kind)),
        ]);
    }
    println!("{table}");
    println!();

    if artifact.configs.is_empty() {
        println!("No config files");
    } else {
        let mut table = output::new_table(&["PATH", "LAYER"]);
        for (path, entry) in &artifact.configs {
            table.add_row([format!("/{}", path.display()), entry.layer.clone()]);
        }
        println!("{table}");
    }
    println!();

    if artifact.has_script() {
        println!("Script functions: {}", artifact.functions.join(", "));
    } else {
        println!("No scripts");
    }

    Ok(())
}
