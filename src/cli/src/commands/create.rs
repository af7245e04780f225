//! `osconfig create` command: create an empty local layer.

use clap::Args;
use osconfig_core::OsConfig;

#[derive(Args)]
pub struct CreateArgs {
    /// Name of the new layer
    pub name: String,
}

pub async fn execute(args: CreateArgs, config: &OsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config);
    let layer = store.create(&args.name)?;
    println!("Created layer {} at {}", layer.name, layer.path.display());
    Ok(())
}
