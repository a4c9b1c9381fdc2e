// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process fake of the remote API plus engine helpers.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use offline_sync::config::Config;
use offline_sync::db::{KvStore, MemoryKv};
use offline_sync::models::{CredentialSet, SyncStatus};
use offline_sync::SyncEngine;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

pub const INITIAL_ACCESS: &str = "access-0";
pub const INITIAL_REFRESH: &str = "refresh-0";

/// A call received by the fake API.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub token: Option<String>,
    pub body: Value,
}

/// Scriptable server state.
pub struct FakeState {
    valid_access: Mutex<String>,
    valid_refresh: Mutex<String>,
    minted: AtomicU64,
    pub refresh_calls: AtomicUsize,
    pub refresh_fails: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
    pub call_delay_ms: AtomicU64,
    /// Reject every bearer token, even freshly minted ones
    pub always_unauthorized: AtomicBool,
    pub healthy: AtomicBool,
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<HashMap<String, u16>>,
}

#[allow(dead_code)]
impl FakeState {
    /// Invalidate the access token the client currently holds.
    pub fn expire_access_token(&self) {
        *self.valid_access.lock().unwrap() = "expired".to_string();
    }

    pub fn current_access_token(&self) -> String {
        self.valid_access.lock().unwrap().clone()
    }

    /// Make every call to `path` answer with `status`.
    pub fn fail_path(&self, path: &str, status: u16) {
        self.failures
            .lock()
            .unwrap()
            .insert(path.to_string(), status);
    }

    pub fn heal_path(&self, path: &str) {
        self.failures.lock().unwrap().remove(path);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.path == path)
            .collect()
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

/// Running fake API server.
pub struct FakeApi {
    pub base_url: String,
    pub state: Arc<FakeState>,
}

#[allow(dead_code)]
impl FakeApi {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState {
            valid_access: Mutex::new(INITIAL_ACCESS.to_string()),
            valid_refresh: Mutex::new(INITIAL_REFRESH.to_string()),
            minted: AtomicU64::new(0),
            refresh_calls: AtomicUsize::new(0),
            refresh_fails: AtomicBool::new(false),
            refresh_delay_ms: AtomicU64::new(0),
            call_delay_ms: AtomicU64::new(0),
            always_unauthorized: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
        });

        let app = Router::new()
            .route("/auth/refresh", post(refresh))
            .route("/health", get(health))
            .fallback(authenticated_call)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake API");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn config(&self) -> Config {
        Config {
            api_base_url: self.base_url.clone(),
            http_timeout: Duration::from_secs(5),
            ..Config::default()
        }
    }

    /// Engine over fresh in-memory storage, logged in with the initial tokens.
    pub async fn engine(&self) -> SyncEngine {
        self.engine_with(self.config(), Arc::new(MemoryKv::new()))
            .await
    }

    pub async fn engine_with(&self, config: Config, kv: Arc<dyn KvStore>) -> SyncEngine {
        let engine = SyncEngine::new(config, kv)
            .await
            .expect("Failed to build engine");
        if !engine.has_session() {
            engine
                .login(CredentialSet::new(INITIAL_ACCESS, INITIAL_REFRESH))
                .await
                .expect("Failed to log in");
        }
        engine
    }
}

async fn health(State(state): State<Arc<FakeState>>) -> StatusCode {
    if state.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn refresh(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if state.refresh_fails.load(Ordering::SeqCst) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_grant"}))).into_response();
    }

    let presented = body["refresh_token"].as_str().unwrap_or_default();
    if presented != state.valid_refresh.lock().unwrap().as_str() {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_grant"}))).into_response();
    }

    let n = state.minted.fetch_add(1, Ordering::SeqCst) + 1;
    let access = format!("access-{}", n);
    let refresh = format!("refresh-{}", n);
    *state.valid_access.lock().unwrap() = access.clone();
    *state.valid_refresh.lock().unwrap() = refresh.clone();

    Json(json!({ "access_token": access, "refresh_token": refresh })).into_response()
}

async fn authenticated_call(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    state.calls.lock().unwrap().push(RecordedCall {
        method: method.to_string(),
        path: uri.path().to_string(),
        token: token.clone(),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let delay = state.call_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let authorized = !state.always_unauthorized.load(Ordering::SeqCst)
        && token.as_deref() == Some(state.valid_access.lock().unwrap().as_str());
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let failure = state.failures.lock().unwrap().get(uri.path()).copied();
    if let Some(status) = failure {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, Json(json!({"error": "scripted failure"}))).into_response();
    }

    Json(json!({"ok": true})).into_response()
}

/// Wait until the engine status satisfies `predicate`.
#[allow(dead_code)]
pub async fn wait_for_status<F>(rx: &mut watch::Receiver<SyncStatus>, predicate: F) -> SyncStatus
where
    F: FnMut(&SyncStatus) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("Timed out waiting for sync status")
        .expect("Status channel closed")
        .clone()
}
