//! Layer store: local layers plus the cache of fetched remote layers.

pub mod layout;
mod layer_store;

pub use layer_store::{LayerStore, LOCAL_DIR, REMOTE_DIR};
