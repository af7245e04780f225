//! `osconfig add-package` command: append packages to a requirement list.

use clap::Args;
use osconfig_core::{OsConfig, RequirementKind};

#[derive(Args)]
pub struct AddPackageArgs {
    /// Layer name
    pub layer: String,

    /// Package family: rpm, deb or pip
    pub kind: RequirementKind,

    /// Packages to add
    #[arg(required = true)]
    pub packages: Vec<String>,
}

pub async fn execute(
    args: AddPackageArgs,
    config: &OsConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config);
    for package in &args.packages {
        store.add_requirement(&args.layer, args.kind, package)?;
    }
    println!(
        "Added {} {} package(s) to {}",
        args.packages.len(),
        args.kind,
        args.layer
    );
    Ok(())
}
