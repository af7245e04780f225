//! `osconfig refresh` command: update a cached remote layer.

use clap::Args;
use osconfig_core::OsConfig;

#[derive(Args)]
pub struct RefreshArgs {
    /// Git repository URL
    pub url: String,

    /// Branch or tag (defaults to the configured default branch)
    #[arg(short, long)]
    pub branch: Option<String>,
}

pub async fn execute(args: RefreshArgs, config: &OsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config);
    let layer = store.refresh(&args.url, args.branch.as_deref()).await?;
    println!("Refreshed {} ({})", layer.name, layer.origin);
    Ok(())
}
