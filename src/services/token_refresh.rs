// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-flight credential refresh.
//!
//! At most one refresh exchange is in flight at a time. Callers that need a
//! renewed credential while one is running are parked as waiters and all
//! receive the outcome of that same exchange.

use crate::db::CredentialStore;
use crate::error::{Result, SyncError};
use crate::models::CredentialSet;
use crate::services::api::ApiClient;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

/// Result broadcast to every waiter when a refresh settles.
#[derive(Debug, Clone)]
enum RefreshOutcome {
    Renewed(String),
    Expired,
}

type Waiter = oneshot::Sender<RefreshOutcome>;

enum RefreshState {
    Idle,
    Refreshing { waiters: Vec<Waiter> },
}

struct Inner {
    api: ApiClient,
    credentials: Arc<CredentialStore>,
    state: Mutex<RefreshState>,
    /// Number of refresh exchanges started
    refresh_count: AtomicU64,
}

/// Owner of the session credentials and of their renewal.
#[derive(Clone)]
pub struct TokenRefreshCoordinator {
    inner: Arc<Inner>,
}

impl TokenRefreshCoordinator {
    pub fn new(api: ApiClient, credentials: Arc<CredentialStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                credentials,
                state: Mutex::new(RefreshState::Idle),
                refresh_count: AtomicU64::new(0),
            }),
        }
    }

    pub fn has_session(&self) -> bool {
        self.inner.credentials.has_session()
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(
            *self.inner.lock_state(),
            RefreshState::Refreshing { .. }
        )
    }

    pub fn refresh_count(&self) -> u64 {
        self.inner.refresh_count.load(Ordering::SeqCst)
    }

    /// Install credentials for a freshly authenticated user.
    pub async fn start_session(&self, credentials: CredentialSet) -> Result<()> {
        self.inner.credentials.save(credentials).await?;
        tracing::info!("Session started");
        Ok(())
    }

    /// Clear credentials; the user is treated as logged out.
    pub async fn end_session(&self) -> Result<()> {
        self.inner.credentials.clear().await?;
        tracing::warn!("Session ended, credentials cleared");
        Ok(())
    }

    /// A usable access token.
    ///
    /// If a refresh is in flight the caller waits for it rather than being
    /// handed the token that is being replaced.
    pub async fn valid_credential(&self) -> Result<String> {
        let rx = {
            let mut state = self.inner.lock_state();
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    rx
                }
                RefreshState::Idle => {
                    return self
                        .inner
                        .credentials
                        .access_token()
                        .ok_or(SyncError::SessionExpired);
                }
            }
        };
        Self::wait(rx).await
    }

    /// Obtain a renewed token after the remote API rejected `stale_token`.
    ///
    /// If the stored token already differs from `stale_token`, another
    /// caller's refresh has landed and that token is returned without a
    /// second exchange.
    pub async fn refresh_after_rejection(&self, stale_token: &str) -> Result<String> {
        let rx = {
            let mut state = self.inner.lock_state();

            match self.inner.credentials.access_token() {
                None => return Err(SyncError::SessionExpired),
                Some(current) if current != stale_token => {
                    tracing::debug!("Credential already renewed, reusing it");
                    return Ok(current);
                }
                Some(_) => {}
            }

            let (tx, rx) = oneshot::channel();
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    waiters.push(tx);
                    tracing::debug!(waiters = waiters.len(), "Joined in-flight refresh");
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing { waiters: vec![tx] };
                    // Runs detached so a dropped caller cannot leave the
                    // state stuck in Refreshing.
                    tokio::spawn(self.inner.clone().run_refresh());
                }
            }
            rx
        };
        Self::wait(rx).await
    }

    async fn wait(rx: oneshot::Receiver<RefreshOutcome>) -> Result<String> {
        match rx.await {
            Ok(RefreshOutcome::Renewed(token)) => Ok(token),
            Ok(RefreshOutcome::Expired) | Err(_) => Err(SyncError::SessionExpired),
        }
    }
}

impl Inner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_refresh(self: Arc<Self>) {
        let attempt = self.refresh_count.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(attempt, "Refreshing credentials");

        let outcome = match self.exchange().await {
            Ok(token) => {
                tracing::info!("Credentials refreshed");
                RefreshOutcome::Renewed(token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Credential refresh failed, ending session");
                if let Err(e) = self.credentials.clear().await {
                    tracing::error!(error = %e, "Failed to clear credentials");
                }
                RefreshOutcome::Expired
            }
        };

        // Take every waiter and return to Idle in one step, then release them.
        let waiters = match std::mem::replace(&mut *self.lock_state(), RefreshState::Idle) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => Vec::new(),
        };
        tracing::debug!(waiters = waiters.len(), "Settling refresh waiters");
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn exchange(&self) -> Result<String> {
        let refresh_token = self
            .credentials
            .current()
            .ok_or(SyncError::SessionExpired)?
            .refresh_token;

        let renewed = self.api.refresh_credentials(&refresh_token).await?;
        let access_token = renewed.access_token.clone();
        self.credentials.save(renewed).await?;
        Ok(access_token)
    }
}
