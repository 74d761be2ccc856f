//! Application wiring
//!
//! Ties the loader, state store and persistence together and runs the startup
//! sequence:
//!
//! ```text
//! share link present? ── yes ──> decode ──ok──> restore
//!         │                        │
//!         no                    decode error (reported)
//!         │                        │
//!         └──────────> fetch + parse CSV <┘
//! ```
//!
//! A CSV fetch failure ends startup. Snapshot decode failures are reported in
//! the [`StartupReport`] and the CSV is loaded instead.

use crate::config::{Config, StoreBackend};
use crate::error::AppResult;
use crate::loader::{CsvLoader, Source};
use crate::persistence::{
    decode_share_link, share_link, Clipboard, FileStore, KeyValueStore, MemoryStore,
    PersistenceError, SnapshotStore, SqliteStore,
};
use crate::state::ViewStateStore;
use std::sync::Arc;
use std::time::Duration;

/// How the session should be seeded
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    /// Share link (or its query string) to restore from
    pub share_link: Option<String>,
    /// Start from the saved snapshot instead of the CSV
    pub from_saved: bool,
}

/// Where the current state came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateOrigin {
    SharedLink,
    SavedSnapshot,
    Csv,
}

/// Outcome of startup, including recoverable problems to show the user
#[derive(Debug, Clone)]
pub struct StartupReport {
    pub origin: StateOrigin,
    pub warnings: Vec<String>,
}

/// A running session
pub struct App {
    config: Config,
    loader: CsvLoader,
    source: Source,
    snapshots: SnapshotStore,
    store: ViewStateStore,
}

impl App {
    /// Create an app with an explicit snapshot backend
    pub fn new(config: Config, backend: Arc<dyn KeyValueStore>) -> AppResult<Self> {
        let timeout = config.source.timeout_secs.map(Duration::from_secs);
        let loader = CsvLoader::new(timeout)?;
        let source = Source::parse(&config.source.location)?;
        let snapshots = SnapshotStore::new(backend, config.store.key.clone());
        let store = ViewStateStore::new(config.chart.label_order);

        Ok(Self {
            config,
            loader,
            source,
            snapshots,
            store,
        })
    }

    /// Create an app with the backend named in the configuration
    pub fn from_config(config: Config) -> AppResult<Self> {
        let backend: Arc<dyn KeyValueStore> = match config.store.backend {
            StoreBackend::Sqlite => Arc::new(SqliteStore::open(&config.store.sqlite_path())?),
            StoreBackend::File => Arc::new(FileStore::new(config.store.data_path())),
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
        };
        tracing::debug!(backend = backend.name(), "Snapshot backend ready");

        Self::new(config, backend)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn store(&self) -> &ViewStateStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ViewStateStore {
        &mut self.store
    }

    /// Seed the session from a share link, the saved snapshot, or the CSV
    pub async fn startup(&mut self, options: &StartupOptions) -> AppResult<StartupReport> {
        let mut warnings = Vec::new();

        if let Some(link) = options.share_link.as_deref() {
            match decode_share_link(link, &self.config.share.param) {
                Ok(Some(state)) => {
                    self.store.restore(state);
                    return Ok(self.report(StateOrigin::SharedLink, warnings));
                }
                Ok(None) => {
                    tracing::info!("Share link carries no snapshot");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Share link rejected; loading CSV instead");
                    warnings.push(format!("Could not read shared view: {}", e));
                }
            }
        } else if options.from_saved {
            match self.snapshots.load().await {
                Ok(Some(state)) => {
                    self.store.restore(state);
                    return Ok(self.report(StateOrigin::SavedSnapshot, warnings));
                }
                Ok(None) => {
                    warnings.push("No saved settings found.".to_string());
                }
                Err(e @ PersistenceError::SnapshotDecode(_)) => {
                    tracing::warn!(error = %e, "Saved snapshot rejected; loading CSV instead");
                    warnings.push(format!("Could not read saved settings: {}", e));
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.reload_csv().await?;
        Ok(self.report(StateOrigin::Csv, warnings))
    }

    fn report(&self, origin: StateOrigin, warnings: Vec<String>) -> StartupReport {
        tracing::info!(
            ?origin,
            records = self.store.records().len(),
            months = self.store.chart_series().labels.len(),
            "Startup complete"
        );
        StartupReport { origin, warnings }
    }

    /// Fetch and parse the CSV, replacing the current records
    pub async fn reload_csv(&mut self) -> AppResult<()> {
        let records = self.loader.load(&self.source).await?;
        self.store.set_records(records);
        Ok(())
    }

    /// Persist the current state
    pub async fn save(&self) -> AppResult<()> {
        self.snapshots.save(self.store.state()).await?;
        Ok(())
    }

    /// Replace the current state with the saved one.
    ///
    /// Returns `false` and leaves the state alone when nothing is saved.
    pub async fn load(&mut self) -> AppResult<bool> {
        match self.snapshots.load().await? {
            Some(state) => {
                self.store.restore(state);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Forget the saved state; the next startup reads the CSV
    pub async fn reset(&self) -> AppResult<()> {
        self.snapshots.reset().await?;
        Ok(())
    }

    /// Build a share link for the current state and copy it to `clipboard`
    pub async fn share(&self, clipboard: &dyn Clipboard) -> AppResult<String> {
        let link = share_link(
            self.store.state(),
            &self.config.share.page_url,
            &self.config.share.param,
            clipboard,
        )
        .await?;
        Ok(link)
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("source", &self.source)
            .field("snapshot_key", &self.snapshots.key())
            .field("records", &self.store.records().len())
            .finish()
    }
}
