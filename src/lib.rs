//! # Sheet Mirror
//!
//! A service that mirrors rows from an external spreadsheet into a
//! relational table, using content hashing to avoid redundant writes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          sheet-mirror                           │
//! │                                                                 │
//! │  ┌───────────┐     ┌─────────────────────────────────────────┐  │
//! │  │ Scheduler │────►│ SyncEngine                              │  │
//! │  │ (timer)   │     │ fetch → fingerprint → conditional upsert│  │
//! │  └───────────┘     └──────┬──────────────────────┬───────────┘  │
//! │  ┌───────────┐            ▼                      ▼              │
//! │  │ HTTP API  │     ┌─────────────┐      ┌─────────────────┐     │
//! │  │ /data     │────►│ SheetSource │      │ MirrorStore     │     │
//! │  │ /sync ... │     │ (HTTP fetch)│      │ (SQLite upsert) │     │
//! │  └───────────┘     └─────────────┘      └─────────────────┘     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Change Detection
//!
//! Each record is fingerprinted (canonical JSON, SHA-256) and the store's
//! upsert rewrites a row only when the stored fingerprint differs - the
//! comparison lives in the write's `WHERE` clause, so an unchanged dataset
//! produces zero writes and `updated_at` never advances spuriously.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sheet_mirror::{MirrorConfig, MirrorEngine};
//!
//! #[tokio::main]
//! async fn main() -> sheet_mirror::Result<()> {
//!     let config = MirrorConfig::from_env()?;
//!     let engine = MirrorEngine::new(config).await?;
//!     engine.start().await?;
//!
//!     // ... serve sheet_mirror::http::build_router(engine.into()) ...
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod metrics;
pub mod record;
pub mod resilience;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod sync;

// Re-exports for convenience
pub use config::{MirrorConfig, SchedulerConfig, SourceConfig, StoreConfig};
pub use engine::{EngineState, HealthCheck, MirrorEngine};
pub use error::{MirrorError, Result};
pub use fingerprint::fingerprint;
pub use record::Record;
pub use source::{SheetSource, SourceReader};
pub use store::{MirrorStore, StoredRow, UpsertOutcome};
pub use sync::{SyncEngine, SyncReport};
