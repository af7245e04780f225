//! `osconfig download` command: mirror a recipe's packages locally.

use std::path::PathBuf;

use clap::Args;
use osconfig_core::{OsConfig, RequirementKind};
use osconfig_runtime::{create_repo, PackageDownloader};

#[derive(Args)]
pub struct DownloadArgs {
    /// Recipe file (TOML)
    pub recipe: PathBuf,

    /// Package family: rpm or pip
    pub kind: RequirementKind,

    /// Destination directory
    pub dest: PathBuf,

    /// Python interpreter used for pip downloads
    #[arg(long)]
    pub runtime: Option<String>,

    /// Generate repository metadata after downloading (rpm)
    #[arg(long)]
    pub create_repo: bool,
}

pub async fn execute(args: DownloadArgs, config: &OsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let artifact = super::squash_recipe(config, &args.recipe).await?;
    let packages = artifact.requirements(args.kind);

    let runtime = args
        .runtime
        .unwrap_or_else(|| config.runtime_version.clone());
    PackageDownloader::new(runtime, config.apply_timeout())
        .download(args.kind, packages, &args.dest)
        .await?;

    if args.create_repo && !packages.is_empty() {
        create_repo(&args.dest, args.kind, config.apply_timeout()).await?;
    }

    println!(
        "Downloaded {} {} package(s) to {}",
        packages.len(),
        args.kind,
        args.dest.display()
    );
    Ok(())
}
