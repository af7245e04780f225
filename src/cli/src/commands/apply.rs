//! `osconfig apply` command: apply a recipe to a base image.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use osconfig_core::{OsConfig, StepOrder};
use osconfig_runtime::host_check::{check_image_file, check_tools};
use osconfig_runtime::{ApplyOptions, ImageApplier, VirtCustomize};

#[derive(Args)]
pub struct ApplyArgs {
    /// Base image (.qcow2), left untouched
    pub base: PathBuf,

    /// Recipe file (TOML)
    pub recipe: PathBuf,

    /// Output image path
    pub output: PathBuf,

    /// Python interpreter used for the in-image venv
    #[arg(long)]
    pub runtime: Option<String>,

    /// Step order: scripts-first or packages-first
    #[arg(long, value_name = "ORDER")]
    pub step_order: Option<StepOrder>,

    /// Overwrite the output image if it exists
    #[arg(short, long)]
    pub force: bool,
}

pub async fn execute(args: ApplyArgs, config: &OsConfig) -> Result<(), Box<dyn std::error::Error>> {
    check_image_file(&args.base)?;
    if args.output.exists() && !args.force {
        return Err(format!(
            "Output {} already exists (use --force to overwrite)",
            args.output.display()
        )
        .into());
    }

    let missing: Vec<String> = check_tools(&["virt-customize", "guestfish"])
        .into_iter()
        .filter(|t| !t.found())
        .map(|t| t.name)
        .collect();
    if !missing.is_empty() {
        return Err(format!("Missing host tools: {}", missing.join(", ")).into());
    }

    // Resolve and squash before the image is copied
    let artifact = super::squash_recipe(config, &args.recipe).await?;

    let mut options = ApplyOptions::from_config(config);
    if let Some(runtime) = args.runtime {
        options.runtime_version = runtime;
    }
    if let Some(order) = args.step_order {
        options.step_order = order;
    }

    let customizer = Arc::new(VirtCustomize::new(config.apply_timeout()));
    let report = ImageApplier::new(customizer, options)
        .apply(&args.base, &artifact, &args.output)
        .await?;

    for kind in &report.skipped {
        println!("Skipped {kind} packages (not applicable to this image)");
    }
    println!("Created {}", report.output.display());
    Ok(())
}
