//! Requirement list merging.

use std::collections::HashSet;

use osconfig_core::error::{OsConfigError, Result};
use osconfig_core::layer::{parse_requirements, Layer, RequirementKind};
use serde::{Deserialize, Serialize};

/// Duplicate handling for merged requirement lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dedup {
    /// Drop exact duplicates, keeping the first occurrence
    #[default]
    FirstOccurrence,
    /// Plain concatenation
    KeepAll,
}

/// Merged requirement lists, one per package family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirements {
    pub rpm: Vec<String>,
    pub deb: Vec<String>,
    pub pip: Vec<String>,
}

impl Requirements {
    pub fn get(&self, kind: RequirementKind) -> &[String] {
        match kind {
            RequirementKind::Rpm => &self.rpm,
            RequirementKind::Deb => &self.deb,
            RequirementKind::Pip => &self.pip,
        }
    }

    fn get_mut(&mut self, kind: RequirementKind) -> &mut Vec<String> {
        match kind {
            RequirementKind::Rpm => &mut self.rpm,
            RequirementKind::Deb => &mut self.deb,
            RequirementKind::Pip => &mut self.pip,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rpm.is_empty() && self.deb.is_empty() && self.pip.is_empty()
    }
}

/// Read one layer's list for `kind`.
pub fn read_requirements(layer: &Layer, kind: RequirementKind) -> Result<Vec<String>> {
    let path = layer.requirements_file(kind);
    let content = std::fs::read_to_string(&path).map_err(|e| {
        OsConfigError::InvalidLayerStructure {
            path: layer.path.display().to_string(),
            reason: format!("cannot read {}: {}", path.display(), e),
        }
    })?;
    Ok(parse_requirements(&content))
}

/// Concatenate lists in order, then apply `dedup`.
pub fn merge<I>(lists: I, dedup: Dedup) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let merged = lists.into_iter().flatten();
    match dedup {
        Dedup::KeepAll => merged.collect(),
        Dedup::FirstOccurrence => {
            let mut seen = HashSet::new();
            merged.filter(|entry| seen.insert(entry.clone())).collect()
        }
    }
}

/// Merge every kind across `layers` in order.
pub fn merge_layers(layers: &[Layer], dedup: Dedup) -> Result<Requirements> {
    let mut merged = Requirements::default();
    for kind in RequirementKind::ALL {
        let mut lists = Vec::with_capacity(layers.len());
        for layer in layers {
            lists.push(read_requirements(layer, kind)?);
        }
        *merged.get_mut(kind) = merge(lists, dedup);
    }
    Ok(merged)
}
