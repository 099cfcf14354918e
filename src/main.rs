// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! sheet-mirror daemon entry point.
//!
//! Loads configuration from the environment, starts the mirror engine
//! (schema ensure → initial sync → scheduler), and serves the HTTP facade
//! until SIGINT.

use sheet_mirror::http::build_router;
use sheet_mirror::{MirrorConfig, MirrorEngine};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}

async fn run() -> sheet_mirror::Result<()> {
    let config = MirrorConfig::from_env()?;
    let listen_addr = config.http.listen_addr.clone();

    let engine = Arc::new(MirrorEngine::new(config).await?);
    engine.start().await?;

    let router = build_router(Arc::clone(&engine));
    let listener = TcpListener::bind(&listen_addr)
        .await
        .map_err(|e| sheet_mirror::MirrorError::Config(format!("cannot bind {listen_addr}: {e}")))?;
    info!(addr = %listen_addr, "HTTP facade listening");

    let shutdown_engine = Arc::clone(&engine);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("SIGINT received, shutting down");
            shutdown_engine.shutdown().await;
        })
        .await
        .map_err(|e| sheet_mirror::MirrorError::Internal(format!("server error: {e}")))?;

    Ok(())
}
