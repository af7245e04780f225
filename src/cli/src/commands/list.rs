//! `osconfig list` command: show local and cached remote layers.

use clap::Args;
use osconfig_core::{LayerOrigin, OsConfig};

use crate::output;

#[derive(Args)]
pub struct ListArgs {
    /// Only display layer names (and cache keys)
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(args: ListArgs, config: &OsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::open_store(config);
    let layers = store.list()?;

    if args.quiet {
        for (name, _) in &layers {
            println!("{name}");
        }
        return Ok(());
    }

    let mut table = output::new_table(&["NAME", "TYPE", "SOURCE"]);
    for (name, origin) in &layers {
        match origin {
            LayerOrigin::Local => {
                let path = store.local_dir().join(name);
                table.add_row([name.as_str(), "local", &path.display().to_string()]);
            }
            LayerOrigin::Remote { .. } => {
                table.add_row([name.as_str(), "remote", &origin.to_string()]);
            }
        }
    }

    println!("{table}");
    Ok(())
}
