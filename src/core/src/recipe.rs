//! Recipe documents: the ordered list of layers to compose.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{OsConfigError, Result};

/// One entry of a recipe's `layers` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerReference {
    /// A layer in the local layers directory
    Local { name: String },
    /// A layer fetched from a git repository
    Git {
        name: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch_or_tag: Option<String>,
    },
}

impl LayerReference {
    pub fn name(&self) -> &str {
        match self {
            Self::Local { name } | Self::Git { name, .. } => name,
        }
    }
}

impl std::fmt::Display for LayerReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { name } => write!(f, "{}", name),
            Self::Git {
                name,
                url,
                branch_or_tag,
            } => match branch_or_tag {
                Some(branch) => write!(f, "{} ({}@{})", name, url, branch),
                None => write!(f, "{} ({})", name, url),
            },
        }
    }
}

/// Ordered layer stack; later entries take precedence on conflict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub layers: Vec<LayerReference>,
}

impl Recipe {
    /// Load a recipe from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OsConfigError::RecipeError(format!(
                "Failed to read recipe {}: {}",
                path.display(),
                e
            ))
        })?;
        content.parse()
    }
}

impl std::str::FromStr for Recipe {
    type Err = OsConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let recipe: Recipe = toml::from_str(s)
            .map_err(|e| OsConfigError::RecipeError(format!("Failed to parse recipe: {}", e)))?;

        for layer in &recipe.layers {
            if layer.name().trim().is_empty() {
                return Err(OsConfigError::RecipeError(
                    "Layer entry with empty name".to_string(),
                ));
            }
        }

        Ok(recipe)
    }
}
