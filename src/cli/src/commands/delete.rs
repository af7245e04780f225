//! `osconfig delete` command: remove local layers or cached remote layers.

use clap::Args;
use osconfig_core::{OsConfig, OsConfigError};

#[derive(Args)]
pub struct DeleteArgs {
    /// Local layer names or remote cache keys
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Ignore layers that do not exist
    #[arg(short, long)]
    pub force: bool,
}

pub async fn execute(args: DeleteArgs, config: &OsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config);

    let mut errors: Vec<String> = Vec::new();

    for name in &args.names {
        match store.delete(name).await {
            Ok(()) => println!("Deleted: {name}"),
            Err(OsConfigError::LayerNotFound(_)) if args.force => continue,
            Err(e) => errors.push(format!("{name}: {e}")),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        let msg = errors.join("\n");
        Err(format!("Failed to delete layer(s):\n{msg}").into())
    }
}
