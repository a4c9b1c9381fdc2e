// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Offline-first action sync engine.
//!
//! Records user mutations durably while the device is offline, replays them
//! against the remote API once connectivity returns, and keeps concurrent
//! requests from racing on an expired credential.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{CredentialStore, KvStore, QueueStore};
use error::Result;
use futures_util::Stream;
use models::{CredentialSet, DeadLetter, OfflineQueueItem, PendingAction, SyncStatus};
use services::{
    ApiClient, AuthenticatedGateway, ConnectivityObserver, SyncCoordinator, SyncOutcome,
    TokenRefreshCoordinator,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Wired-up engine: store, credentials, gateway and coordinators.
#[derive(Clone)]
pub struct SyncEngine {
    config: Config,
    api: ApiClient,
    refresher: TokenRefreshCoordinator,
    coordinator: Arc<SyncCoordinator>,
}

impl SyncEngine {
    /// Build an engine over `kv`, restoring any persisted session and queue.
    pub async fn new(config: Config, kv: Arc<dyn KvStore>) -> Result<Self> {
        let api = ApiClient::new(&config)?;
        let credentials = Arc::new(CredentialStore::load(kv.clone()).await?);
        let refresher = TokenRefreshCoordinator::new(api.clone(), credentials);
        let gateway = AuthenticatedGateway::new(api.clone(), refresher.clone());
        let store = Arc::new(QueueStore::new(kv));
        let coordinator = Arc::new(SyncCoordinator::new(store, gateway, config.max_attempts));

        coordinator.refresh_status().await?;
        let status = coordinator.current_status();
        tracing::info!(
            pending = status.pending_count,
            calls = status.queue_count,
            dead_letters = status.dead_letter_count,
            session = refresher.has_session(),
            "Sync engine ready"
        );

        Ok(Self {
            config,
            api,
            refresher,
            coordinator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn refresher(&self) -> &TokenRefreshCoordinator {
        &self.refresher
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    pub fn gateway(&self) -> &AuthenticatedGateway {
        self.coordinator.gateway()
    }

    // ─── Session ─────────────────────────────────────────────────

    pub async fn login(&self, credentials: CredentialSet) -> Result<()> {
        self.refresher.start_session(credentials).await
    }

    /// End the session and drop all queued state.
    pub async fn logout(&self) -> Result<()> {
        self.refresher.end_session().await?;
        self.coordinator.clear_all().await
    }

    pub fn has_session(&self) -> bool {
        self.refresher.has_session()
    }

    // ─── Queue ───────────────────────────────────────────────────

    pub async fn enqueue(&self, action: PendingAction) -> Result<()> {
        self.coordinator.enqueue(action).await
    }

    pub async fn enqueue_call(&self, item: OfflineQueueItem) -> Result<()> {
        self.coordinator.enqueue_call(item).await
    }

    pub async fn request_sync(&self) -> Result<SyncOutcome> {
        self.coordinator.request_sync().await
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.coordinator.clear_all().await
    }

    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        self.coordinator.store().dead_letters().await
    }

    // ─── Status ──────────────────────────────────────────────────

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.coordinator.status()
    }

    pub fn current_status(&self) -> SyncStatus {
        self.coordinator.current_status()
    }

    /// Drive syncs from a platform connectivity signal.
    pub fn watch_connectivity<S>(&self, signal: S) -> JoinHandle<()>
    where
        S: Stream<Item = bool> + Send + 'static,
    {
        ConnectivityObserver::spawn(signal, self.coordinator.clone())
    }
}
