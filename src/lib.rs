//! # Carrierview
//!
//! Carrier out-of-service explorer: loads a carrier CSV, derives a monthly
//! out-of-service count series, and persists or shares the view state.
//!
//! ## Pipeline
//!
//! ```text
//! CSV resource ──> loader ──> state store ──> aggregate ──> chart series
//!                                 ▲  │
//!                 share link ─────┘  └────> persistence (save / load / reset)
//! ```
//!
//! ## Modules
//!
//! - [`records`]: the fixed carrier field set and row records
//! - [`loader`]: CSV fetch and header-row parsing
//! - [`aggregate`]: month bucketing and counting
//! - [`state`]: the view state store
//! - [`persistence`]: key-value stores, snapshots and share links
//! - [`grid`]: sort / filter / page over records
//! - [`pivot`]: count cross-tabulation
//! - [`app`]: startup sequence and session wiring
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use carrierview::app::{App, StartupOptions};
//! use carrierview::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut app = App::from_config(Config::from_env())?;
//!     app.startup(&StartupOptions::default()).await?;
//!
//!     for (month, count) in app.store().chart_series().counts() {
//!         println!("{}: {}", month, count);
//!     }
//!
//!     app.store_mut().edit_field(0, "out_of_service_date", "03/15/2021");
//!     app.save().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod app;
pub mod config;
pub mod error;
pub mod grid;
pub mod loader;
pub mod persistence;
pub mod pivot;
pub mod records;
pub mod state;

// Re-export top-level types for convenience
pub use aggregate::{aggregate, parse_service_date, ChartSeries, LabelOrder};
pub use app::{App, StartupOptions, StartupReport, StateOrigin};
pub use config::{Config, ConfigError};
pub use error::{AppError, AppResult};
pub use loader::{CsvLoader, LoadError, Source};
pub use persistence::{
    Clipboard, FileStore, KeyValueStore, MemoryStore, PersistenceError, ShareError,
    SnapshotStore, SqliteStore,
};
pub use records::{Field, RowRecord};
pub use state::{ViewState, ViewStateStore};
