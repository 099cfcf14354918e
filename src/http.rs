// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP facade.
//!
//! A small axum router over the mirror engine:
//!
//! | Route | Behavior |
//! |-------|----------|
//! | `GET /` | plain-text liveness string |
//! | `GET /data` | live fetch from the source (not the mirror) |
//! | `GET /rows` | the stored mirror |
//! | `GET /sync` | run a sync cycle now, report the outcome |
//! | `GET /health` | engine health snapshot |
//!
//! # Failure Mapping
//!
//! Failures surface as distinct status codes with an `{"error": ...}` body:
//! source/parse failures map to 502 (the upstream sheet is the broken
//! party), store and internal failures to 500, shutdown to 503. Success and
//! failure are never conflated under one status.

use crate::engine::MirrorEngine;
use crate::error::MirrorError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

/// Build the API router over an engine.
pub fn build_router(engine: Arc<MirrorEngine>) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/data", get(data_handler))
        .route("/rows", get(rows_handler))
        .route("/sync", get(sync_handler))
        .route("/health", get(health_handler))
        .with_state(engine)
}

fn error_response(err: &MirrorError) -> Response {
    let status = match err {
        MirrorError::Source { .. } | MirrorError::Parse(_) => StatusCode::BAD_GATEWAY,
        MirrorError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
        MirrorError::InvalidState { .. } => StatusCode::CONFLICT,
        MirrorError::Store(_) | MirrorError::Config(_) | MirrorError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

/// `GET /` - liveness.
async fn home_handler() -> &'static str {
    "sheet-mirror online. GET /data for the live sheet, /rows for the mirror, /sync to force a sync."
}

/// `GET /data` - the source's current dataset, fetched live.
async fn data_handler(State(engine): State<Arc<MirrorEngine>>) -> Response {
    match engine.sync_engine().source().fetch().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            error!(error = %e, "Live data fetch failed");
            error_response(&e)
        }
    }
}

/// `GET /rows` - the stored mirror.
async fn rows_handler(State(engine): State<Arc<MirrorEngine>>) -> Response {
    match engine.store().all().await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => {
            error!(error = %e, "Mirror read failed");
            error_response(&e)
        }
    }
}

/// `GET /sync` - run a sync cycle synchronously and report the outcome.
async fn sync_handler(State(engine): State<Arc<MirrorEngine>>) -> Response {
    match engine.sync_now().await {
        Ok(report) => Json(json!({
            "message": "Sync completed.",
            "report": report,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "Manual sync failed");
            error_response(&e)
        }
    }
}

/// `GET /health` - engine health snapshot; 503 until ready.
async fn health_handler(State(engine): State<Arc<MirrorEngine>>) -> Response {
    let health = engine.health_check().await;
    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health)).into_response()
}
