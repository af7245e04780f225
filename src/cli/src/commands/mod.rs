//! CLI command definitions and dispatch.

mod add_file;
mod add_package;
mod apply;
mod check;
mod create;
mod delete;
mod download;
mod import;
mod installed;
mod list;
mod refresh;
mod squash;
mod version;

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use osconfig_core::{OsConfig, Recipe};
use osconfig_runtime::{ComposedArtifact, Composer, LayerResolver, LayerStore};

/// osconfig - compose configuration layers into OS images.
#[derive(Parser)]
#[command(name = "osconfig", version, about)]
pub struct Cli {
    /// Config file (defaults to <home>/config.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Store root, overriding the config file and OSCONFIG_HOME
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Log filter implied by `-v` flags.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Create an empty local layer
    Create(create::CreateArgs),
    /// Delete local layers or cached remote layers
    #[command(visible_alias = "rm")]
    Delete(delete::DeleteArgs),
    /// List local and cached remote layers
    #[command(visible_alias = "ls")]
    List(list::ListArgs),
    /// Fetch a remote layer into the cache
    Import(import::ImportArgs),
    /// Update a cached remote layer from its repository
    Refresh(refresh::RefreshArgs),
    /// Copy a file into a layer's configs tree
    AddFile(add_file::AddFileArgs),
    /// Append packages to a layer's requirement list
    AddPackage(add_package::AddPackageArgs),
    /// Resolve a recipe and show the squashed result
    Squash(squash::SquashArgs),
    /// Apply a recipe to a base image, producing a new image
    Apply(apply::ApplyArgs),
    /// Download a recipe's packages for offline installation
    Download(download::DownloadArgs),
    /// List packages installed in an image
    Installed(installed::InstalledArgs),
    /// Check for required host tools
    Check(check::CheckArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Load configuration, applying the `--home` override.
pub(crate) fn load_config(
    path: Option<&Path>,
    home: Option<&Path>,
) -> Result<OsConfig, Box<dyn std::error::Error>> {
    let mut config = OsConfig::load(path)?;
    if let Some(home) = home {
        config.home = home.to_path_buf();
    }
    Ok(config)
}

/// Open the layer store described by `config`.
pub(crate) fn open_store(config: &OsConfig) -> LayerStore {
    LayerStore::from_config(config)
}

/// Resolve a recipe file and squash its layers.
pub(crate) async fn squash_recipe(
    config: &OsConfig,
    recipe: &Path,
) -> Result<ComposedArtifact, Box<dyn std::error::Error>> {
    let recipe = Recipe::from_file(recipe)?;
    let store = open_store(config);
    let layers = LayerResolver::new(&store).resolve(&recipe).await?;
    let artifact = Composer::from_config(config).squash(&layers)?;
    Ok(artifact)
}

/// Dispatch a parsed CLI to its command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli.config.as_deref(), cli.home.as_deref())?;

    match cli.command {
        Command::Create(args) => create::execute(args, &config).await,
        Command::Delete(args) => delete::execute(args, &config).await,
        Command::List(args) => list::execute(args, &config).await,
        Command::Import(args) => import::execute(args, &config).await,
        Command::Refresh(args) => refresh::execute(args, &config).await,
        Command::AddFile(args) => add_file::execute(args, &config).await,
        Command::AddPackage(args) => add_package::execute(args, &config).await,
        Command::Squash(args) => squash::execute(args, &config).await,
        Command::Apply(args) => apply::execute(args, &config).await,
        Command::Download(args) => download::execute(args, &config).await,
        Command::Installed(args) => installed::execute(args, &config).await,
        Command::Check(args) => check::execute(args).await,
        Command::Version(args) => version::execute(args).await,
    }
}
