//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::aggregate::LabelOrder;
use crate::grid::DEFAULT_PAGE_SIZE;
use crate::persistence::{DEFAULT_SNAPSHOT_KEY, SHARE_PARAM};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub share: ShareConfig,

    #[serde(default)]
    pub chart: ChartConfig,

    #[serde(default)]
    pub grid: GridConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// CSV resource configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// File path or http(s) URL of the carrier CSV
    #[serde(default = "default_source_location")]
    pub location: String,

    /// HTTP timeout; unset waits indefinitely
    pub timeout_secs: Option<u64>,
}

fn default_source_location() -> String {
    "./data.csv".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            location: default_source_location(),
            timeout_secs: None,
        }
    }
}

/// Snapshot store backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    File,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "file" => Ok(StoreBackend::File),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("Unknown store backend: {}", other)),
        }
    }
}

/// Snapshot persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Key the snapshot is stored under
    #[serde(default = "default_snapshot_key")]
    pub key: String,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("carrierview").to_string_lossy().to_string())
        .unwrap_or_else(|| "./carrierview_data".to_string())
}

fn default_snapshot_key() -> String {
    DEFAULT_SNAPSHOT_KEY.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: default_data_dir(),
            key: default_snapshot_key(),
        }
    }
}

impl StoreConfig {
    /// Data directory with a leading `~/` expanded
    pub fn data_path(&self) -> PathBuf {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.data_dir)),
            None => PathBuf::from(&self.data_dir),
        }
    }

    /// SQLite database file inside the data directory
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_path().join("carrierview.db")
    }
}

/// Share link configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ShareConfig {
    /// Page address share links point at
    #[serde(default = "default_page_url")]
    pub page_url: String,

    /// Query parameter carrying the snapshot
    #[serde(default = "default_share_param")]
    pub param: String,
}

fn default_page_url() -> String {
    "http://localhost:3000/".to_string()
}

fn default_share_param() -> String {
    SHARE_PARAM.to_string()
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            param: default_share_param(),
        }
    }
}

/// Chart configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartConfig {
    #[serde(default)]
    pub label_order: LabelOrder,
}

/// Grid configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("carrierview").join("config.toml")),
            Some(PathBuf::from("./carrierview.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths)
    }

    /// Load the first candidate that exists and parses. Broken files are
    /// logged and skipped; with no usable file the defaults apply.
    pub fn load_first(candidates: &[PathBuf]) -> Self {
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load config from {:?}: {}", path, e);
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(location) = std::env::var("CARRIERVIEW_SOURCE") {
            self.source.location = location;
        }

        if let Ok(data_dir) = std::env::var("CARRIERVIEW_DATA_DIR") {
            self.store.data_dir = data_dir;
        }
        if let Ok(backend) = std::env::var("CARRIERVIEW_STORE_BACKEND") {
            match backend.parse() {
                Ok(b) => self.store.backend = b,
                Err(e) => tracing::warn!("Ignoring CARRIERVIEW_STORE_BACKEND: {}", e),
            }
        }

        if let Ok(page_url) = std::env::var("CARRIERVIEW_PAGE_URL") {
            self.share.page_url = page_url;
        }

        if let Ok(level) = std::env::var("CARRIERVIEW_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CARRIERVIEW_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Carrierview Configuration
#
# Environment variables override these settings:
# - CARRIERVIEW_SOURCE
# - CARRIERVIEW_DATA_DIR
# - CARRIERVIEW_STORE_BACKEND
# - CARRIERVIEW_PAGE_URL
# - CARRIERVIEW_LOG_LEVEL
# - CARRIERVIEW_LOG_FORMAT

[source]
# Carrier CSV: a file path or an http(s) URL
location = "./data.csv"

# HTTP timeout in seconds (unset waits indefinitely)
# timeout_secs = 30

[store]
# Snapshot backend: sqlite, file or memory
backend = "sqlite"

# Directory for the snapshot database or files
data_dir = "~/.local/share/carrierview"

# Key the snapshot is stored under
key = "tableSettings"

[share]
# Page address that share links point at
page_url = "http://localhost:3000/"

# Query parameter carrying the snapshot
param = "settings"

[chart]
# Month label order: first_seen or chronological
label_order = "first_seen"

[grid]
# Rows per page
page_size = 10

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.source.location, "./data.csv");
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.key, "tableSettings");
        assert_eq!(config.share.param, "settings");
        assert_eq!(config.chart.label_order, LabelOrder::FirstSeen);
        assert_eq!(config.grid.page_size, 10);
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(Path::new("generated.toml"), &generate_default_config()).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.share.page_url, "http://localhost:3000/");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.source.timeout_secs.is_none());
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [chart]
            label_order = "chronological"

            [store]
            backend = "file"
        "#;
        let config = Config::parse(Path::new("partial.toml"), toml).unwrap();

        assert_eq!(config.chart.label_order, LabelOrder::Chronological);
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.store.key, "tableSettings");
        assert_eq!(config.source.location, "./data.csv");
    }

    #[test]
    fn test_data_path_expands_home() {
        let store = StoreConfig {
            data_dir: "/var/lib/carrierview".to_string(),
            ..Default::default()
        };
        assert_eq!(
            store.sqlite_path(),
            PathBuf::from("/var/lib/carrierview/carrierview.db")
        );

        let store = StoreConfig {
            data_dir: "~/.local/share/carrierview".to_string(),
            ..Default::default()
        };
        assert!(!store.data_path().starts_with("~"));
    }

    #[test]
    fn test_parse_error() {
        let err = Config::parse(Path::new("bad.toml"), "[store]\nbackend = \"floppy\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("carrierview.toml");
        std::fs::write(&path, "[grid]\npage_size = 50\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.grid.page_size, 50);

        let missing = Config::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_first_skips_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.toml");
        let good = dir.path().join("good.toml");
        std::fs::write(&broken, "[grid\npage_size = ").unwrap();
        std::fs::write(&good, "[grid]\npage_size = 40\n").unwrap();

        let config = Config::load_first(&[dir.path().join("absent.toml"), broken.clone(), good]);
        assert_eq!(config.grid.page_size, 40);

        let fallback = Config::load_first(&[broken]);
        assert_eq!(fallback.store.key, "tableSettings");
    }
}
