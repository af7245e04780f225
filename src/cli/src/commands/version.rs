//! `osconfig version` command.

use clap::Args;

#[derive(Args)]
pub struct VersionArgs;

pub async fn execute(_args: VersionArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("osconfig version {}", osconfig_core::VERSION);
    println!("cache scheme v{}", osconfig_runtime::CACHE_SCHEME_VERSION);
    Ok(())
}
