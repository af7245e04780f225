//! `osconfig add-file` command: copy a host file into a layer.

use std::path::PathBuf;

use clap::Args;
use osconfig_core::OsConfig;

#[derive(Args)]
pub struct AddFileArgs {
    /// Layer name
    pub layer: String,

    /// File on the host to copy
    pub file: PathBuf,

    /// Destination directory inside the image (e.g. /etc/nginx)
    pub dest: PathBuf,
}

pub async fn execute(args: AddFileArgs, config: &OsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config);
    let target = store.add_file(&args.layer, &args.file, &args.dest)?;
    println!("Added {} to {}", target.display(), args.layer);
    Ok(())
}
