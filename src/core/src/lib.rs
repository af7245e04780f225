//! osconfig Core - Foundational Types
//!
//! Error taxonomy, configuration, recipe schema and the layer data model
//! shared by the runtime engines and the CLI.

pub mod apply;
pub mod config;
pub mod error;
pub mod layer;
pub mod recipe;

// Re-export commonly used types
pub use apply::{ApplyState, StepOrder};
pub use config::OsConfig;
pub use error::{OsConfigError, Result};
pub use layer::{Layer, LayerOrigin, RequirementKind};
pub use recipe::{LayerReference, Recipe};

/// osconfig version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
