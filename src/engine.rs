// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Mirror engine lifecycle.
//!
//! The main orchestrator that ties together:
//! - Source access via [`crate::source::SheetSource`]
//! - Sync cycles via [`crate::sync::SyncEngine`]
//! - Row persistence via [`crate::store::MirrorStore`]
//! - Scheduled syncs via [`crate::scheduler`]
//!
//! # Lifecycle
//!
//! 1. `start()` ensures the store schema (once, never inside request
//!    handling), optionally runs an immediate first sync, and spawns the
//!    scheduler task.
//! 2. `shutdown()` signals the scheduler, waits for it to drain, and closes
//!    the store.
//!
//! # State Transitions
//!
//! ```text
//!                 start()
//! Created ──────────────────→ Starting
//!                                 │
//!                                 │ (schema ensured)
//!                                 ↓
//!                             Running
//!                                 │
//!                       shutdown()│
//!                                 ↓
//!                          ShuttingDown ──→ Stopped
//!
//! (start() failure → Failed)
//! ```

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::metrics;
use crate::scheduler;
use crate::source::{SheetSource, SourceReader};
use crate::store::MirrorStore;
use crate::sync::{SyncEngine, SyncReport};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

/// State of the mirror engine.
///
/// See module docs for the state transition diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    /// Engine created but not started.
    Created,
    /// `start()` in progress: ensuring schema, running the initial sync.
    Starting,
    /// Running: scheduler active, HTTP surface serving.
    Running,
    /// Shutting down gracefully, draining the scheduler task.
    ShuttingDown,
    /// Stopped cleanly. Safe to drop.
    Stopped,
    /// Failed to start. Check logs for details.
    Failed,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Created => write!(f, "Created"),
            EngineState::Starting => write!(f, "Starting"),
            EngineState::Running => write!(f, "Running"),
            EngineState::ShuttingDown => write!(f, "ShuttingDown"),
            EngineState::Stopped => write!(f, "Stopped"),
            EngineState::Failed => write!(f, "Failed"),
        }
    }
}

/// Health snapshot for monitoring endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    /// Current engine state.
    pub state: EngineState,
    /// Whether the engine is in `Running` state.
    pub ready: bool,
    /// Ready and the store is answering queries.
    pub healthy: bool,
    /// Rows currently held in the mirror table.
    pub mirrored_rows: u64,
    /// Report of the most recent sync cycle, if one has completed.
    pub last_sync: Option<SyncReport>,
}

/// The main mirror engine.
///
/// Owns the store, the sync engine, and the scheduler task. The HTTP facade
/// holds an `Arc<MirrorEngine>` and delegates to it.
pub struct MirrorEngine {
    config: MirrorConfig,

    /// Sync orchestration (shared with the scheduler task).
    sync: Arc<SyncEngine>,

    /// Row persistence.
    store: Arc<MirrorStore>,

    /// Engine state (broadcast to watchers).
    state_tx: watch::Sender<EngineState>,

    /// Engine state receiver (for internal use).
    state_rx: watch::Receiver<EngineState>,

    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,

    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,

    /// Background task handles.
    task_handles: RwLock<Vec<tokio::task::JoinHandle<()>>>,
}

impl MirrorEngine {
    /// Create an engine with the production sheet source.
    ///
    /// Opens the store pool; the table itself is created by
    /// [`start()`](Self::start).
    pub async fn new(config: MirrorConfig) -> Result<Self> {
        let source = Arc::new(SheetSource::new(&config.source)?);
        Self::with_source(config, source).await
    }

    /// Create an engine with a caller-supplied source.
    ///
    /// This is the seam tests use to script the source without a network.
    pub async fn with_source(
        config: MirrorConfig,
        source: Arc<dyn SourceReader>,
    ) -> Result<Self> {
        let store = Arc::new(MirrorStore::connect(&config.store).await?);
        let sync = Arc::new(SyncEngine::new(source, Arc::clone(&store)));

        let (state_tx, state_rx) = watch::channel(EngineState::Created);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            sync,
            store,
            state_tx,
            state_rx,
            shutdown_tx,
            shutdown_rx,
            task_handles: RwLock::new(Vec::new()),
        })
    }

    /// Get current engine state.
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Check if the engine is running.
    pub fn is_running(&self) -> bool {
        matches!(self.state(), EngineState::Running)
    }

    /// The sync engine (for the manual trigger endpoint).
    pub fn sync_engine(&self) -> &Arc<SyncEngine> {
        &self.sync
    }

    /// The mirror store (for the stored-rows endpoint).
    pub fn store(&self) -> &Arc<MirrorStore> {
        &self.store
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Start the engine.
    ///
    /// 1. Ensures the mirror table exists
    /// 2. Runs an immediate first sync (if configured); a source failure
    ///    here is logged, not fatal - the scheduler will try again
    /// 3. Spawns the scheduler task (if enabled)
    pub async fn start(&self) -> Result<()> {
        if self.state() != EngineState::Created {
            return Err(MirrorError::InvalidState {
                expected: "Created".to_string(),
                actual: format!("{:?}", self.state()),
            });
        }

        info!(
            document_id = %self.config.source.document_id,
            store = %self.store.path(),
            "Starting mirror engine"
        );
        let _ = self.state_tx.send(EngineState::Starting);
        metrics::set_engine_state("Starting");

        if let Err(e) = self.store.ensure_schema().await {
            let _ = self.state_tx.send(EngineState::Failed);
            metrics::set_engine_state("Failed");
            return Err(e);
        }

        if self.config.scheduler.sync_on_start {
            if let Err(e) = self.sync.sync().await {
                warn!(error = %e, "Initial sync failed, continuing");
            }
        }

        if self.config.scheduler.enabled {
            let sync = Arc::clone(&self.sync);
            let scheduler_config = self.config.scheduler.clone();
            let shutdown_rx = self.shutdown_rx.clone();

            let handle = tokio::spawn(async move {
                scheduler::run_scheduler(sync, scheduler_config, shutdown_rx).await;
            });
            self.task_handles.write().await.push(handle);
            info!(interval = %self.config.scheduler.interval, "Spawned sync scheduler");
        }

        let _ = self.state_tx.send(EngineState::Running);
        metrics::set_engine_state("Running");
        info!("Mirror engine running");

        Ok(())
    }

    /// Run one sync cycle now (manual trigger path).
    pub async fn sync_now(&self) -> Result<SyncReport> {
        if matches!(self.state(), EngineState::ShuttingDown | EngineState::Stopped) {
            return Err(MirrorError::Shutdown);
        }
        self.sync.sync().await
    }

    /// Get a health snapshot for monitoring endpoints.
    pub async fn health_check(&self) -> HealthCheck {
        let state = self.state();
        let ready = state == EngineState::Running;

        let (mirrored_rows, store_ok) = match self.store.count().await {
            Ok(count) => (count, true),
            Err(e) => {
                warn!(error = %e, "Health check store query failed");
                (0, false)
            }
        };

        HealthCheck {
            state,
            ready,
            healthy: ready && store_ok,
            mirrored_rows,
            last_sync: self.sync.last_report().await,
        }
    }

    /// Shut down gracefully: stop the scheduler, drain, close the store.
    pub async fn shutdown(&self) {
        if matches!(self.state(), EngineState::Stopped | EngineState::ShuttingDown) {
            return;
        }

        info!("Shutting down mirror engine");
        let _ = self.state_tx.send(EngineState::ShuttingDown);
        metrics::set_engine_state("ShuttingDown");
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<_> = self.task_handles.write().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        self.store.close().await;
        let _ = self.state_tx.send(EngineState::Stopped);
        metrics::set_engine_state("Stopped");
        info!("Mirror engine stopped");
    }
}
