//! Remote layer cache.
//!
//! - `RemoteCache`: clones keyed by repository and branch, with metadata
//! - `KeyLocks`: single-writer access per cache key

pub mod lock;
pub mod remote_cache;

pub use lock::KeyLocks;
pub use remote_cache::{RemoteCache, RemoteMeta, CACHE_SCHEME_VERSION};
