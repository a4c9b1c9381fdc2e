// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated request gateway.
//!
//! Attaches the session token to every call. A 401 triggers one refresh
//! through the [`TokenRefreshCoordinator`] and exactly one retry; a second
//! 401 ends the session.

use crate::error::{Result, SyncError};
use crate::models::{OfflineQueueItem, PendingAction, Route};
use crate::services::api::ApiClient;
use crate::services::token_refresh::TokenRefreshCoordinator;
use serde_json::Value;

#[derive(Clone)]
pub struct AuthenticatedGateway {
    api: ApiClient,
    refresher: TokenRefreshCoordinator,
}

impl AuthenticatedGateway {
    pub fn new(api: ApiClient, refresher: TokenRefreshCoordinator) -> Self {
        Self { api, refresher }
    }

    pub fn refresher(&self) -> &TokenRefreshCoordinator {
        &self.refresher
    }

    /// Send an authenticated call, renewing the credential at most once.
    pub async fn send(&self, route: &Route, payload: &Value) -> Result<Value> {
        let token = self.refresher.valid_credential().await?;

        match self.api.send(route, &token, payload).await {
            Err(SyncError::Unauthorized) => {}
            other => return other,
        }

        tracing::debug!(path = %route.path, "Authorization rejected, refreshing credential");
        let renewed = self.refresher.refresh_after_rejection(&token).await?;

        match self.api.send(route, &renewed, payload).await {
            Err(SyncError::Unauthorized) => {
                tracing::warn!(path = %route.path, "Authorization rejected after refresh");
                if let Err(e) = self.refresher.end_session().await {
                    tracing::error!(error = %e, "Failed to clear credentials");
                }
                Err(SyncError::SessionExpired)
            }
            other => other,
        }
    }

    /// Send a domain action to the route its type maps to.
    pub async fn dispatch_action(&self, action: &PendingAction) -> Result<Value> {
        self.send(&action.route(), action.payload()).await
    }

    /// Replay a generic deferred call.
    pub async fn dispatch_call(&self, item: &OfflineQueueItem) -> Result<Value> {
        self.send(&item.route(), &item.payload).await
    }
}
