//! osconfig Runtime - layer pipeline implementation.
//!
//! This crate provides the engines behind osconfig: the remote fetcher and
//! its cache, the layer store, the recipe resolver, the composer and the
//! image applier, plus host checks and offline package mirroring.

#![allow(clippy::result_large_err)]

pub mod apply;
pub mod cache;
pub mod compose;
pub mod fetch;
mod fs;
pub mod host_check;
pub mod packages;
pub mod process;
pub mod resolve;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-export common types
pub use apply::{ApplyOptions, ApplyReport, ImageApplier, ImageCustomizer, VirtCustomize};
pub use cache::{KeyLocks, RemoteCache, RemoteMeta, CACHE_SCHEME_VERSION};
pub use compose::{ComposedArtifact, Composer, ConfigEntry, ConfigTree, Dedup, Requirements};
pub use fetch::{FetchedRemote, GitCli, GitTransport, RemoteFetcher, RemoteReference};
pub use host_check::{check_dependencies, check_image_file, ToolStatus};
pub use packages::{create_repo, list_installed, PackageDownloader};
pub use resolve::LayerResolver;
pub use store::LayerStore;

/// osconfig Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
