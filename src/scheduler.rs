// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Background sync scheduling.
//!
//! One process-wide timer task invokes [`SyncEngine::sync()`] at a fixed
//! interval. The task runs until shutdown is signaled on its watch channel.
//! Missed ticks are skipped rather than bursted: if a cycle overruns the
//! interval, the next cycle waits for the next tick instead of piling up.
//!
//! A cycle failure (unreachable source) is logged and the task keeps
//! running - the next tick simply tries again.

use crate::config::SchedulerConfig;
use crate::sync::SyncEngine;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

/// Run the scheduled sync task.
///
/// Returns when shutdown is signaled. The first cycle fires one full
/// interval after start; any immediate startup sync is the engine's
/// responsibility, not the scheduler's.
pub async fn run_scheduler(
    sync: Arc<SyncEngine>,
    config: SchedulerConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // Mark initial shutdown value as seen so changed() only fires on actual changes
    let _ = shutdown_rx.borrow_and_update();

    let interval = config.interval_duration();

    info!(
        interval_secs = interval.as_secs(),
        "Starting sync scheduler"
    );

    let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
    // Skip missed ticks instead of bursting to catch up
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            // Priority: check shutdown first
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    info!("Shutdown signal received, stopping sync scheduler");
                    break;
                }
                continue;
            }

            _ = timer.tick() => {
                // Time to run a sync cycle
            }
        }

        if let Err(e) = sync.sync().await {
            warn!(error = %e, "Scheduled sync cycle failed");
        }
    }
}
