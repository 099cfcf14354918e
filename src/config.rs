//! Configuration for the mirror service.
//!
//! All tunables live in one [`MirrorConfig`] constructed once at startup and
//! passed by reference into each component's constructor. Nothing reads the
//! environment after startup. Configuration can be built programmatically,
//! deserialized from JSON/YAML, or loaded from the environment via
//! [`MirrorConfig::from_env()`].
//!
//! # Configuration Structure
//!
//! ```text
//! MirrorConfig
//! ├── source: SourceConfig      # spreadsheet API endpoint + credentials
//! ├── store: StoreConfig        # SQLite mirror table
//! ├── scheduler: SchedulerConfig # background sync cadence
//! └── http: HttpConfig          # listen address for the API facade
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default |
//! |----------|---------|
//! | `SHEET_MIRROR_BASE_URL` | `https://sheets.googleapis.com/v4/spreadsheets` |
//! | `SHEET_MIRROR_DOCUMENT_ID` | (required) |
//! | `SHEET_MIRROR_RANGE` | `Sheet1` |
//! | `SHEET_MIRROR_API_TOKEN` | (none) |
//! | `SHEET_MIRROR_FETCH_TIMEOUT` | `30s` |
//! | `SHEET_MIRROR_DB_PATH` | `sheet_mirror.db` |
//! | `SHEET_MIRROR_SYNC_INTERVAL` | `10m` |
//! | `SHEET_MIRROR_SYNC_ON_START` | `true` |
//! | `SHEET_MIRROR_LISTEN_ADDR` | `0.0.0.0:5000` |

use crate::error::{MirrorError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config: passed to MirrorEngine::new()
// ═══════════════════════════════════════════════════════════════════════════════

/// The top-level config object passed to `MirrorEngine::new()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[derive(Default)]
pub struct MirrorConfig {
    /// Spreadsheet source endpoint and credentials.
    #[serde(default)]
    pub source: SourceConfig,

    /// Mirror table persistence settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Background sync cadence.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// HTTP facade settings.
    #[serde(default)]
    pub http: HttpConfig,
}

impl MirrorConfig {
    /// Load configuration from `SHEET_MIRROR_*` environment variables.
    ///
    /// Fails if `SHEET_MIRROR_DOCUMENT_ID` is unset; everything else falls
    /// back to defaults.
    pub fn from_env() -> Result<Self> {
        let document_id = std::env::var("SHEET_MIRROR_DOCUMENT_ID")
            .map_err(|_| MirrorError::Config("SHEET_MIRROR_DOCUMENT_ID is not set".to_string()))?;

        let mut config = Self::default();
        config.source.document_id = document_id;
        if let Ok(v) = std::env::var("SHEET_MIRROR_BASE_URL") {
            config.source.base_url = v;
        }
        if let Ok(v) = std::env::var("SHEET_MIRROR_RANGE") {
            config.source.range = v;
        }
        if let Ok(v) = std::env::var("SHEET_MIRROR_API_TOKEN") {
            config.source.api_token = Some(v);
        }
        if let Ok(v) = std::env::var("SHEET_MIRROR_FETCH_TIMEOUT") {
            config.source.fetch_timeout = v;
        }
        if let Ok(v) = std::env::var("SHEET_MIRROR_DB_PATH") {
            config.store.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("SHEET_MIRROR_SYNC_INTERVAL") {
            config.scheduler.interval = v;
        }
        if let Ok(v) = std::env::var("SHEET_MIRROR_SYNC_ON_START") {
            config.scheduler.sync_on_start = matches!(v.as_str(), "1" | "true" | "TRUE" | "yes");
        }
        if let Ok(v) = std::env::var("SHEET_MIRROR_LISTEN_ADDR") {
            config.http.listen_addr = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.source.document_id.is_empty() {
            return Err(MirrorError::Config("document_id must not be empty".to_string()));
        }
        if humantime::parse_duration(&self.scheduler.interval).is_err() {
            return Err(MirrorError::Config(format!(
                "invalid sync interval: {:?}",
                self.scheduler.interval
            )));
        }
        Ok(())
    }

    /// Create a minimal config for testing: in-memory store, no scheduler.
    pub fn for_testing(document_id: &str) -> Self {
        Self {
            source: SourceConfig {
                document_id: document_id.to_string(),
                ..SourceConfig::default()
            },
            store: StoreConfig::in_memory(),
            scheduler: SchedulerConfig {
                enabled: false,
                sync_on_start: false,
                ..SchedulerConfig::default()
            },
            http: HttpConfig::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SourceConfig: where the sheet lives and how to reach it
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for the spreadsheet source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the spreadsheet values API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Identifier of the spreadsheet document to mirror.
    #[serde(default)]
    pub document_id: String,

    /// Sheet range to read (first row is the header row).
    #[serde(default = "default_range")]
    pub range: String,

    /// Optional bearer token for the source API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Per-request timeout as a duration string (e.g., "30s").
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: String,

    /// Maximum fetch attempts per sync cycle (1 = no retry).
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: usize,
}

fn default_base_url() -> String {
    "https://sheets.googleapis.com/v4/spreadsheets".to_string()
}

fn default_range() -> String {
    "Sheet1".to_string()
}

fn default_fetch_timeout() -> String {
    "30s".to_string()
}

fn default_fetch_attempts() -> usize {
    3
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            document_id: String::new(),
            range: default_range(),
            api_token: None,
            fetch_timeout: default_fetch_timeout(),
            fetch_attempts: 3,
        }
    }
}

impl SourceConfig {
    /// Full URL of the values endpoint for this document and range.
    pub fn values_url(&self) -> String {
        format!(
            "{}/{}/values/{}",
            self.base_url.trim_end_matches('/'),
            self.document_id,
            self.range
        )
    }

    /// Parse the fetch_timeout string to a Duration.
    pub fn fetch_timeout_duration(&self) -> Duration {
        humantime::parse_duration(&self.fetch_timeout).unwrap_or(Duration::from_secs(30))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// StoreConfig: mirror table persistence
// ═══════════════════════════════════════════════════════════════════════════════

/// Mirror store persistence configuration.
///
/// The mirrored rows are kept in SQLite so the mirror survives restarts of
/// both this process and the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub sqlite_path: String,

    /// Whether to use WAL mode for SQLite (recommended).
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: "sheet_mirror.db".to_string(),
            wal_mode: true,
        }
    }
}

impl StoreConfig {
    /// Create an in-memory config for testing.
    pub fn in_memory() -> Self {
        Self {
            sqlite_path: ":memory:".to_string(),
            wal_mode: false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SchedulerConfig: background sync cadence
// ═══════════════════════════════════════════════════════════════════════════════

/// Background sync scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the background scheduler is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between sync cycles as a duration string (e.g., "10m").
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Run one sync cycle immediately when the engine starts.
    #[serde(default = "default_true")]
    pub sync_on_start: bool,
}

fn default_interval() -> String {
    "10m".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_interval(),
            sync_on_start: true,
        }
    }
}

impl SchedulerConfig {
    /// Parse the interval string to a Duration.
    pub fn interval_duration(&self) -> Duration {
        humantime::parse_duration(&self.interval).unwrap_or(Duration::from_secs(600))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HttpConfig: API facade
// ═══════════════════════════════════════════════════════════════════════════════

/// HTTP facade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Socket address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
