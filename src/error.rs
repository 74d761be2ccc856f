//! Application error types
//!
//! Unifies the layer errors for the startup sequence and the CLI.

use crate::config::ConfigError;
use crate::loader::LoadError;
use crate::persistence::{PersistenceError, ShareError};
use thiserror::Error;

/// Errors surfaced by [`App`](crate::app::App) operations
#[derive(Error, Debug)]
pub enum AppError {
    /// The CSV resource could not be retrieved; fatal at startup
    #[error("Failed to load CSV resource: {0}")]
    ResourceFetch(#[from] LoadError),

    /// Snapshot storage failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Share link could not be built or read
    #[error("Share link error: {0}")]
    Share(#[from] ShareError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AppError {
    /// True for a snapshot that exists but cannot be decoded, as opposed to
    /// storage or network failures
    pub fn is_snapshot_decode(&self) -> bool {
        matches!(
            self,
            AppError::Persistence(PersistenceError::SnapshotDecode(_))
                | AppError::Share(ShareError::SnapshotDecode(_))
        )
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
