use crate::error::SnapshotError;
use crate::state::StateSnapshot;
use crate::store::{LoadFuture, SaveFuture, SnapshotStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Snapshot store held in memory, for tests
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshot: Mutex<Option<StateSnapshot>>,
    load_error: Option<String>,
    save_error: Option<String>,
    save_count: AtomicUsize,
}

impl MemorySnapshotStore {
    /// Store that has nothing persisted yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already holds `snapshot`
    pub fn with_snapshot(snapshot: StateSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Make every load fail with a fetch error
    pub fn failing_load(mut self, message: impl Into<String>) -> Self {
        self.load_error = Some(message.into());
        self
    }

    /// Make every save fail with a write error
    pub fn failing_save(mut self, message: impl Into<String>) -> Self {
        self.save_error = Some(message.into());
        self
    }

    /// Currently persisted snapshot
    pub fn saved(&self) -> Option<StateSnapshot> {
        self.lock().clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Option<StateSnapshot>> {
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> LoadFuture<'_> {
        Box::pin(async move {
            if let Some(message) = &self.load_error {
                return Err(SnapshotError::Fetch(message.clone()));
            }
            self.lock()
                .clone()
                .ok_or_else(|| SnapshotError::NotFound("memory".to_string()))
        })
    }

    fn save<'a>(&'a self, snapshot: &'a StateSnapshot) -> SaveFuture<'a> {
        Box::pin(async move {
            if let Some(message) = &self.save_error {
                return Err(SnapshotError::Write(message.clone()));
            }
            *self.lock() = Some(snapshot.clone());
            self.save_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{EntityId, Entries, Value};

    #[tokio::test]
    async fn test_empty_store_is_not_found() {
        let store = MemorySnapshotStore::new();
        assert!(matches!(store.load().await, Err(SnapshotError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = MemorySnapshotStore::new();
        let snapshot =
            StateSnapshot::observed_now(Entries::from([(EntityId::from("A"), Value::Count(1))]));

        store.save(&snapshot).await.unwrap();

        assert_eq!(store.load().await.unwrap(), snapshot);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_save_keeps_previous_snapshot() {
        let store = MemorySnapshotStore::with_snapshot(StateSnapshot::empty()).failing_save("disk full");

        assert!(matches!(
            store.save(&StateSnapshot::observed_now(Entries::new())).await,
            Err(SnapshotError::Write(_))
        ));
        assert_eq!(store.saved(), Some(StateSnapshot::empty()));
        assert_eq!(store.save_count(), 0);
    }
}
