//! Snapshot save / load / reset
//!
//! The whole [`ViewState`] is stored as one JSON document under a fixed key.

use super::{KeyValueStore, PersistenceError, PersistenceResult};
use crate::state::ViewState;
use std::sync::Arc;

/// Key the browser build stored its snapshot under
pub const DEFAULT_SNAPSHOT_KEY: &str = "tableSettings";

/// Persists view state snapshots through a [`KeyValueStore`]
#[derive(Clone)]
pub struct SnapshotStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl SnapshotStore {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write the snapshot, replacing any earlier one
    pub async fn save(&self, state: &ViewState) -> PersistenceResult<()> {
        let json = serde_json::to_string(state)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        self.store.put(&self.key, &json).await?;

        tracing::info!(
            backend = self.store.name(),
            key = %self.key,
            records = state.records.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// Read the snapshot back. `Ok(None)` when nothing has been saved.
    pub async fn load(&self) -> PersistenceResult<Option<ViewState>> {
        let Some(json) = self.store.get(&self.key).await? else {
            tracing::info!(backend = self.store.name(), key = %self.key, "No saved snapshot");
            return Ok(None);
        };

        let state: ViewState = serde_json::from_str(&json)
            .map_err(|e| PersistenceError::SnapshotDecode(e.to_string()))?;

        tracing::info!(
            backend = self.store.name(),
            key = %self.key,
            records = state.records.len(),
            "Snapshot loaded"
        );
        Ok(Some(state))
    }

    /// Delete the snapshot so the next startup loads the CSV again
    pub async fn reset(&self) -> PersistenceResult<()> {
        self.store.delete(&self.key).await?;
        tracing::info!(backend = self.store.name(), key = %self.key, "Snapshot reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::LabelOrder;
    use crate::persistence::{FileStore, MemoryStore, SqliteStore};
    use crate::records::{Field, RowRecord};
    use crate::state::ViewStateStore;
    use serde_json::json;

    fn sample_state() -> ViewState {
        let mut store = ViewStateStore::with_records(
            vec![
                RowRecord::new()
                    .with(Field::LegalName, "Acme Inc")
                    .with(Field::OutOfServiceDate, "2021-03-15"),
                RowRecord::new().with(Field::LegalName, "Beta LLC"),
            ],
            LabelOrder::FirstSeen,
        );
        store.set_settings(json!({ "pivot": { "rows": ["entity_type"], "cols": [] } }));
        store.snapshot()
    }

    async fn check_lifecycle(snapshots: SnapshotStore) {
        assert!(snapshots.load().await.unwrap().is_none());

        let state = sample_state();
        snapshots.save(&state).await.unwrap();
        snapshots.save(&state).await.unwrap();
        assert_eq!(snapshots.load().await.unwrap(), Some(state));

        snapshots.reset().await.unwrap();
        assert!(snapshots.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_memory() {
        check_lifecycle(SnapshotStore::new(
            Arc::new(MemoryStore::new()),
            DEFAULT_SNAPSHOT_KEY,
        ))
        .await;
    }

    #[tokio::test]
    async fn test_lifecycle_file() {
        let dir = tempfile::tempdir().unwrap();
        check_lifecycle(SnapshotStore::new(
            Arc::new(FileStore::new(dir.path())),
            DEFAULT_SNAPSHOT_KEY,
        ))
        .await;
    }

    #[tokio::test]
    async fn test_lifecycle_sqlite() {
        check_lifecycle(SnapshotStore::new(
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            DEFAULT_SNAPSHOT_KEY,
        ))
        .await;
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_decode_error() {
        let backend = Arc::new(MemoryStore::new());
        backend.put(DEFAULT_SNAPSHOT_KEY, "{not json").await.unwrap();

        let snapshots = SnapshotStore::new(backend, DEFAULT_SNAPSHOT_KEY);
        let err = snapshots.load().await.unwrap_err();
        assert!(matches!(err, PersistenceError::SnapshotDecode(_)));
    }

    #[tokio::test]
    async fn test_reset_without_save_is_ok() {
        let snapshots = SnapshotStore::new(Arc::new(MemoryStore::new()), "other");
        snapshots.reset().await.unwrap();
        assert!(snapshots.load().await.unwrap().is_none());
    }
}
