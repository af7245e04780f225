//! `osconfig installed` command: list packages installed in an image.

use std::path::PathBuf;

use clap::Args;
use osconfig_core::OsConfig;
use osconfig_runtime::host_check::check_image_file;
use osconfig_runtime::{list_installed, VirtCustomize};

#[derive(Args)]
pub struct InstalledArgs {
    /// Image (.qcow2) to inspect, opened read-only
    pub image: PathBuf,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: InstalledArgs, config: &OsConfig) -> Result<(), Box<dyn std::error::Error>> {
    check_image_file(&args.image)?;

    let customizer = VirtCustomize::new(config.apply_timeout());
    let (packages, kind) = list_installed(&customizer, &args.image).await?;

    if args.json {
        let value = serde_json::json!({ "kind": kind, "packages": packages });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("# {} packages ({})", kind, packages.len());
    for package in &packages {
        println!("{package}");
    }
    Ok(())
}
