//! Layer resolver - turns a recipe into an ordered, validated layer stack.

use osconfig_core::error::{OsConfigError, Result};
use osconfig_core::layer::Layer;
use osconfig_core::recipe::{LayerReference, Recipe};

use crate::store::LayerStore;

/// Resolves recipe entries through a [`LayerStore`].
pub struct LayerResolver<'a> {
    store: &'a LayerStore,
}

impl<'a> LayerResolver<'a> {
    pub fn new(store: &'a LayerStore) -> Self {
        Self { store }
    }

    /// Resolve every entry in recipe order.
    ///
    /// The first failing entry aborts the whole resolution; no partial stack
    /// is returned.
    pub async fn resolve(&self, recipe: &Recipe) -> Result<Vec<Layer>> {
        let mut layers = Vec::with_capacity(recipe.layers.len());
        for reference in &recipe.layers {
            let layer = self
                .resolve_one(reference)
                .await
                .map_err(|e| OsConfigError::resolution(reference.to_string(), e))?;
            tracing::debug!(
                layer = %layer.name,
                identity = %layer.identity,
                origin = %layer.origin,
                "Resolved layer"
            );
            layers.push(layer);
        }

        tracing::info!(layers = layers.len(), "Resolved recipe");
        Ok(layers)
    }

    async fn resolve_one(&self, reference: &LayerReference) -> Result<Layer> {
        match reference {
            LayerReference::Local { name } => self.store.local(name),
            LayerReference::Git {
                name,
                url,
                branch_or_tag,
            } => {
                let mut layer = self.store.import(url, branch_or_tag.as_deref()).await?;
                layer.name = name.clone();
                Ok(layer)
            }
        }
    }
}
