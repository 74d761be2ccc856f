//! Persistence Adapter
//!
//! Saves, loads and resets the view state in a key-value store, and encodes it
//! into share links.
//!
//! - **memory**: in-process store, used as the fake in tests
//! - **file**: one JSON document per key in a data directory
//! - **sqlite**: a `settings` table keyed by id, the layout the browser build
//!   used in IndexedDB
//! - **snapshot**: save / load / reset of a [`ViewState`](crate::state::ViewState)
//! - **share**: share-link encoding and decoding
//! - **clipboard**: where generated share links are copied to
//!
//! # Example
//!
//! ```rust,no_run
//! use carrierview::persistence::{MemoryStore, SnapshotStore};
//! use carrierview::state::ViewState;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let snapshots = SnapshotStore::new(Arc::new(MemoryStore::new()), "tableSettings");
//!
//!     snapshots.save(&ViewState::default()).await?;
//!     assert!(snapshots.load().await?.is_some());
//!
//!     snapshots.reset().await?;
//!     assert!(snapshots.load().await?.is_none());
//!     Ok(())
//! }
//! ```

pub mod clipboard;
pub mod file;
pub mod memory;
pub mod share;
pub mod snapshot;
pub mod sqlite;

pub use clipboard::{Clipboard, MemoryClipboard, StdoutClipboard};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use share::{build_share_link, decode_share_link, share_link, ShareError, SHARE_PARAM};
pub use snapshot::{SnapshotStore, DEFAULT_SNAPSHOT_KEY};
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

/// Key-value capability the snapshot store writes through
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Value stored under `key`, `None` when nothing is stored
    async fn get(&self, key: &str) -> PersistenceResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn put(&self, key: &str, value: &str) -> PersistenceResult<()>;

    /// Remove `key`; removing a missing key succeeds
    async fn delete(&self, key: &str) -> PersistenceResult<()>;
}

/// Errors that can occur while persisting view state
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite operation failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// State could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored snapshot exists but is not a valid view state
    #[error("Snapshot decode error: {0}")]
    SnapshotDecode(String),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),

    /// Blocking task panicked or was cancelled
    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type alias for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PersistenceError::SnapshotDecode("expected value at line 1".to_string());
        assert_eq!(
            err.to_string(),
            "Snapshot decode error: expected value at line 1"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: PersistenceError = io_err.into();
        assert!(matches!(err, PersistenceError::Io(_)));
    }
}
