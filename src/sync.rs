// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The sync engine: one fetch-and-conditionally-upsert pass.
//!
//! A sync cycle:
//! 1. Fetch the full current dataset from the source. A failed fetch ends
//!    the cycle with no store mutation - the existing mirror is never
//!    cleared or corrupted by an unreachable source.
//! 2. For each record in source order: skip it if it has no usable
//!    identifier, otherwise fingerprint it and hand it to the store's
//!    conditional upsert.
//! 3. Aggregate the outcome counts into a [`SyncReport`].
//!
//! # Failure Policy
//!
//! Row-level store failures are caught, logged, and counted; they do not
//! abort the remaining rows. A cycle is best-effort per row and only fails
//! as a whole when the fetch itself fails.
//!
//! # Reentrancy
//!
//! The timer and the manual HTTP trigger share one `SyncEngine`, and
//! `sync()` holds a single-slot async lock for the duration of a cycle, so
//! overlapping triggers serialize instead of double-fetching.

use crate::error::Result;
use crate::fingerprint::fingerprint;
use crate::metrics;
use crate::source::SourceReader;
use crate::store::{MirrorStore, UpsertOutcome};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Aggregated counts from one sync cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Records returned by the source.
    pub fetched: usize,
    /// Rows inserted or rewritten.
    pub applied: usize,
    /// Rows whose fingerprint already matched.
    pub unchanged: usize,
    /// Records without a usable identifier.
    pub skipped: usize,
    /// Rows that hit a store error.
    pub failed: usize,
    /// Wall-clock duration of the cycle in milliseconds.
    pub duration_ms: u64,
    /// Cycle completion time, epoch milliseconds.
    pub completed_at: i64,
}

/// Orchestrates read → fingerprint → conditional upsert.
pub struct SyncEngine {
    source: Arc<dyn SourceReader>,
    store: Arc<MirrorStore>,
    /// Single-slot gate serializing timer-triggered and manual syncs.
    gate: Mutex<()>,
    /// Report of the most recent completed cycle, regardless of trigger.
    last_report: RwLock<Option<SyncReport>>,
}

impl SyncEngine {
    /// Create a sync engine over the given source and store.
    pub fn new(source: Arc<dyn SourceReader>, store: Arc<MirrorStore>) -> Self {
        Self {
            source,
            store,
            gate: Mutex::new(()),
            last_report: RwLock::new(None),
        }
    }

    /// Report of the most recent completed cycle, if any.
    pub async fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().await.clone()
    }

    /// The store this engine writes to.
    pub fn store(&self) -> &Arc<MirrorStore> {
        &self.store
    }

    /// The source this engine reads from.
    pub fn source(&self) -> &Arc<dyn SourceReader> {
        &self.source
    }

    /// Run one sync cycle.
    ///
    /// Returns the aggregated [`SyncReport`], or the fetch error if the
    /// source was unreachable (in which case the store was not touched).
    pub async fn sync(&self) -> Result<SyncReport> {
        let _cycle = self.gate.lock().await;
        let started = Instant::now();

        let records = match self.source.fetch().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Sync cycle aborted: source fetch failed");
                metrics::record_sync_aborted("fetch_failed");
                return Err(e);
            }
        };

        let mut report = SyncReport {
            fetched: records.len(),
            ..SyncReport::default()
        };

        for record in &records {
            let Some(id) = record.id() else {
                debug!("Skipping record without identifier");
                report.skipped += 1;
                continue;
            };

            let hash = fingerprint(record);
            match self.store.upsert(&id, record, &hash).await {
                Ok(UpsertOutcome::Applied) => report.applied += 1,
                Ok(UpsertOutcome::Unchanged) => report.unchanged += 1,
                Err(e) => {
                    // One bad row must not block the rest of the cycle.
                    warn!(id = %id, error = %e, "Row upsert failed");
                    report.failed += 1;
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        report.completed_at = chrono::Utc::now().timestamp_millis();

        metrics::record_sync_cycle(
            report.fetched,
            report.applied,
            report.unchanged,
            report.skipped,
            report.failed,
            started.elapsed(),
        );
        if let Ok(count) = self.store.count().await {
            metrics::set_mirror_rows(count);
        }

        info!(
            fetched = report.fetched,
            applied = report.applied,
            unchanged = report.unchanged,
            skipped = report.skipped,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "Sync cycle complete"
        );

        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }
}
