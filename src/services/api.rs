// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote API client.
//!
//! Handles:
//! - Bearer-authenticated JSON calls
//! - Credential refresh exchange
//! - Reachability probing
//! - Mapping HTTP failures onto the sync error taxonomy

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::models::{CredentialSet, HttpMethod, Route};
use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Remote API client.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    refresh_path: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("failed building API HTTP client")?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            refresh_path: config.refresh_path.clone(),
        })
    }

    /// Issue an authenticated call and return its JSON body.
    ///
    /// Empty bodies come back as `Value::Null`.
    pub async fn send(&self, route: &Route, access_token: &str, payload: &Value) -> Result<Value> {
        let mut request = self
            .http
            .request(route.method.into(), self.url(&route.path))
            .bearer_auth(access_token);
        if !payload.is_null() {
            request = request.json(payload);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Exchange a refresh token for a new credential pair.
    ///
    /// Servers that do not rotate refresh tokens may omit it from the
    /// response; the old one is kept in that case.
    pub async fn refresh_credentials(&self, refresh_token: &str) -> Result<CredentialSet> {
        let response = self
            .http
            .post(self.url(&self.refresh_path))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| SyncError::Network(format!("Token refresh request failed: {}", e)))?;

        let status = response.status().as_u16();
        if matches!(status, 400 | 401 | 403) {
            tracing::warn!(status, "Refresh token rejected");
            return Err(SyncError::SessionExpired);
        }

        let body: TokenRefreshResponse = serde_json::from_value(
            self.check_response_json(response).await?,
        )?;

        Ok(CredentialSet {
            access_token: body.access_token,
            refresh_token: body
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
        })
    }

    /// Whether the API answers on `path` with a success status.
    pub async fn probe(&self, path: &str) -> bool {
        match self.http.get(self.url(path)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::trace!(error = %e, "Reachability probe failed");
                false
            }
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Network(format!("Failed reading response body: {}", e)))?;

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)));
        }

        let status = status.as_u16();
        match status {
            401 => Err(SyncError::Unauthorized),
            500..=599 => Err(SyncError::Server { status, body }),
            // 408 and 429 are worth retrying later; the rest of 4xx is the
            // server refusing the mutation itself.
            408 | 429 => Err(SyncError::Server { status, body }),
            _ => Err(SyncError::Rejected { status, body }),
        }
    }
}

/// Refresh endpoint response.
#[derive(Debug, Clone, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}
