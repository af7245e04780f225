//! `osconfig import` command: fetch a remote layer into the cache.

use clap::Args;
use osconfig_core::OsConfig;

#[derive(Args)]
pub struct ImportArgs {
    /// Git repository URL (https://host/owner/repo[.git])
    pub url: String,

    /// Branch or tag (defaults to the configured default branch)
    #[arg(short, long)]
    pub branch: Option<String>,
}

pub async fn execute(args: ImportArgs, config: &OsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config);
    let layer = store.import(&args.url, args.branch.as_deref()).await?;
    println!("Imported {} ({})", layer.name, layer.origin);
    println!("Cache key: {}", layer.identity);
    Ok(())
}
