//! Config tree merging: later layers replace whole files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use osconfig_core::error::Result;
use osconfig_core::layer::Layer;
use serde::{Deserialize, Serialize};

use crate::fs::list_files;

/// Winning contribution for one path in the merged tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Name of the layer that provided the file
    pub layer: String,
    /// File inside that layer's `configs/` directory
    pub source: PathBuf,
}

/// Merged config tree keyed by path relative to the image root.
pub type ConfigTree = BTreeMap<PathBuf, ConfigEntry>;

/// Overlay each layer's `configs/` tree in order.
pub fn merge_configs(layers: &[Layer]) -> Result<ConfigTree> {
    let mut tree = ConfigTree::new();
    for layer in layers {
        let configs_dir = layer.configs_dir();
        for relative in list_files(&configs_dir)? {
            let entry = ConfigEntry {
                layer: layer.name.clone(),
                source: configs_dir.join(&relative),
            };
            displace_conflicting_nodes(&mut tree, &relative, &layer.name);
            if let Some(previous) = tree.insert(relative.clone(), entry) {
                tracing::debug!(
                    path = %relative.display(),
                    replaced = %previous.layer,
                    by = %layer.name,
                    "Config file overridden by later layer"
                );
            }
        }
    }
    Ok(tree)
}

/// Drop earlier entries whose node type clashes with a file at `path`:
/// files sitting where `path` needs a directory, and files below `path`
/// when an earlier layer had a directory there.
fn displace_conflicting_nodes(tree: &mut ConfigTree, path: &Path, layer: &str) {
    let mut displaced: Vec<PathBuf> = path
        .ancestors()
        .skip(1)
        .filter(|ancestor| !ancestor.as_os_str().is_empty() && tree.contains_key(*ancestor))
        .map(Path::to_path_buf)
        .collect();
    displaced.extend(
        tree.range(path.to_path_buf()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(path))
            .filter(|key| key.as_path() != path)
            .cloned(),
    );

    for key in displaced {
        if let Some(previous) = tree.remove(&key) {
            tracing::debug!(
                path = %key.display(),
                replaced = %previous.layer,
                by = %layer,
                "Config node replaced by later layer"
            );
        }
    }
}
