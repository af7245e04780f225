use thiserror::Error;

use crate::apply::ApplyState;

/// osconfig error types
#[derive(Error, Debug)]
pub enum OsConfigError {
    /// Malformed repository URL or reference. Raised before any side effect.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Neither the requested ref nor the fallback branch exists upstream
    #[error("Remote not found: {url} (tried: {})", tried.join(", "))]
    RemoteNotFound { url: String, tried: Vec<String> },

    /// No layer with this name or cache key
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    /// A layer with this name already exists
    #[error("Layer already exists: {0}")]
    AlreadyExists(String),

    /// Layer name is not a single, plain path component
    #[error("Invalid layer name: {0}")]
    InvalidLayerName(String),

    /// Requirement entry is blank or spans several lines
    #[error("Invalid package name: {0:?}")]
    InvalidPackageName(String),

    /// Layer directory is missing a required directory or requirement file
    #[error("Invalid layer structure at {path}: {reason}")]
    InvalidLayerStructure { path: String, reason: String },

    /// A recipe entry could not be resolved; wraps the first failure
    #[error("Failed to resolve layer '{reference}': {cause}")]
    LayerResolutionFailed {
        reference: String,
        #[source]
        cause: Box<OsConfigError>,
    },

    /// Reserved for stricter merge policies
    #[error("Composition conflict at {path}: {message}")]
    CompositionConflict { path: String, message: String },

    /// Image application aborted while entering `state`
    #[error("Apply failed at {state}: {cause}")]
    ApplyFailed { state: ApplyState, cause: String },

    /// Destination path escapes the layer tree
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Source file for add-file does not exist
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// Source path for add-file is not a regular file
    #[error("Source is not a file: {0}")]
    SourceNotAFile(String),

    /// Base image missing or unusable
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// Operation not available for this package family
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// External command exceeded its time bound
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// External command exited unsuccessfully
    #[error("Command failed: {command} (status {status}): {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    /// Recipe document could not be read or parsed
    #[error("Recipe error: {0}")]
    RecipeError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Cache bookkeeping error
    #[error("Cache error: {0}")]
    CacheError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl OsConfigError {
    /// Wrap an error as the cause of a failed recipe entry.
    pub fn resolution(reference: impl Into<String>, cause: OsConfigError) -> Self {
        OsConfigError::LayerResolutionFailed {
            reference: reference.into(),
            cause: Box::new(cause),
        }
    }

    /// Wrap an error as an apply failure at `state`.
    pub fn apply(state: ApplyState, cause: impl std::fmt::Display) -> Self {
        OsConfigError::ApplyFailed {
            state,
            cause: cause.to_string(),
        }
    }
}

impl From<serde_json::Error> for OsConfigError {
    fn from(err: serde_json::Error) -> Self {
        OsConfigError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for OsConfigError {
    fn from(err: toml::de::Error) -> Self {
        OsConfigError::SerializationError(err.to_string())
    }
}

/// Result type alias for osconfig operations
pub type Result<T> = std::result::Result<T, OsConfigError>;
