//! Shared notes table and its change feed.

pub mod error;
pub mod feed;
pub mod sled_remote;

pub use error::RemoteError;
pub use feed::{Change, ChangeFeed};
pub use sled_remote::{RemoteConfig, SledRemote};
