// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Offline sync agent
//!
//! Keeps the durable action queue flowing to the remote API: watches
//! reachability and drains the queue whenever the API comes back.

use offline_sync::{
    config::Config,
    db::FileKv,
    services::connectivity::probe_signal,
    SyncEngine,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        api = %config.api_base_url,
        data_dir = %config.data_dir.display(),
        max_attempts = ?config.max_attempts,
        "Starting offline sync agent"
    );

    // Open durable storage
    let kv = Arc::new(FileKv::open(&config.data_dir).await?);

    let engine = SyncEngine::new(config.clone(), kv).await?;
    if !engine.has_session() {
        tracing::warn!("No stored session; queued actions will wait for login");
    }

    // Reachability probe stands in for a platform connectivity signal
    let signal = probe_signal(
        engine.api().clone(),
        config.health_path.clone(),
        config.probe_interval,
    );
    let observer = engine.watch_connectivity(signal);

    // Log every status change until shutdown
    let mut status = engine.status();
    let reporter = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let snapshot = status.borrow_and_update().clone();
            tracing::info!(
                pending = snapshot.pending_count,
                calls = snapshot.queue_count,
                dead_letters = snapshot.dead_letter_count,
                online = snapshot.is_online,
                syncing = snapshot.is_syncing,
                last_sync_at = ?snapshot.last_sync_at,
                "Sync status"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    observer.abort();
    reporter.abort();
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("offline_sync=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
