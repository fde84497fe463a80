//! Persistence of the last observed snapshot
//!
//! A store replaces the persisted snapshot as a whole. Two overlapping runs
//! against the same store race on `save` and the last write wins; runs are
//! expected to be serialized by whatever schedules them.

/// Local JSON file store
pub mod file_store;

/// In-memory store for tests
pub mod memory_store;

/// Store reading from object storage over HTTP
pub mod remote_store;

pub use file_store::FileSnapshotStore;
pub use memory_store::MemorySnapshotStore;
pub use remote_store::RemoteSnapshotStore;

use crate::error::SnapshotError;
use crate::state::StateSnapshot;
use std::future::Future;
use std::pin::Pin;

/// Future returned by [`SnapshotStore::load`]
pub type LoadFuture<'a> = Pin<Box<dyn Future<Output = Result<StateSnapshot, SnapshotError>> + Send + 'a>>;

/// Future returned by [`SnapshotStore::save`]
pub type SaveFuture<'a> = Pin<Box<dyn Future<Output = Result<(), SnapshotError>> + Send + 'a>>;

/// Trait for snapshot persistence backends
pub trait SnapshotStore: Send + Sync {
    /// Load the last persisted snapshot
    ///
    /// Fails with `SnapshotError::NotFound` when nothing has been persisted yet.
    fn load(&self) -> LoadFuture<'_>;

    /// Replace the persisted snapshot
    fn save<'a>(&'a self, snapshot: &'a StateSnapshot) -> SaveFuture<'a>;
}
