//! Remote layer fetching.
//!
//! - `RemoteReference`: URL + branch parsing and cache keys
//! - `GitTransport`: injectable raw transport (`GitCli` shells out to git)
//! - `RemoteFetcher`: cache-first fetch with branch fallback

pub mod fetcher;
pub mod reference;
pub mod transport;

pub use fetcher::{FetchedRemote, LayerCheck, RemoteFetcher};
pub use reference::RemoteReference;
pub use transport::{GitCli, GitTransport};
