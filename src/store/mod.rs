//! Concrete backends for the promotion stores.
//!
//! Production deployments typically point the promoter at managed services
//! (an S3-like object store, a key/value record store) through their own
//! [`ObjectStore`](crate::promote::ObjectStore) /
//! [`TrackedStore`](crate::promote::TrackedStore) implementations. This
//! module ships two pairs that cover everything else:
//!
//! - [`FsObjectStore`] and [`FsTrackedStore`]: a release layout rooted in a
//!   local directory and a JSON record file - what the `rollout promote`
//!   subcommand drives, and a convenient staging setup behind any static
//!   file server.
//! - [`MemoryObjectStore`] and [`MemoryTrackedStore`]: in-process stores for
//!   tests and embedders.

mod fs;
mod memory;

pub use fs::{FsObjectStore, FsTrackedStore};
pub use memory::{MemoryObjectStore, MemoryTrackedStore};
