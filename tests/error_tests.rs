// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mapping of remote failures onto the error taxonomy.

use offline_sync::config::Config;
use offline_sync::error::SyncError;
use offline_sync::models::{HttpMethod, Route};
use offline_sync::services::ApiClient;
use serde_json::Value;

mod common;
use common::{FakeApi, INITIAL_ACCESS};

fn route(path: &str) -> Route {
    Route {
        method: HttpMethod::Post,
        path: path.to_string(),
    }
}

#[tokio::test]
async fn test_status_codes_are_classified() {
    let api = FakeApi::start().await;
    let client = ApiClient::new(&api.config()).unwrap();

    api.state.fail_path("/conflict", 409);
    api.state.fail_path("/unavailable", 503);
    api.state.fail_path("/throttled", 429);

    let err = client
        .send(&route("/conflict"), INITIAL_ACCESS, &Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Rejected { status: 409, .. }));
    assert!(!err.is_transient());

    let err = client
        .send(&route("/unavailable"), INITIAL_ACCESS, &Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Server { status: 503, .. }));
    assert!(err.is_transient());

    let err = client
        .send(&route("/throttled"), INITIAL_ACCESS, &Value::Null)
        .await
        .unwrap_err();
    assert!(err.is_transient());

    let err = client
        .send(&route("/anything"), "wrong-token", &Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Unauthorized));
    assert!(err.is_auth_error());

    let body = client
        .send(&route("/anything"), INITIAL_ACCESS, &Value::Null)
        .await
        .unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_unreachable_api_is_network_error() {
    let config = Config {
        api_base_url: "http://127.0.0.1:9".to_string(),
        ..Config::default()
    };
    let client = ApiClient::new(&config).unwrap();

    let err = client
        .send(&route("/bookings/B1/accept"), "token", &Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Network(_)));
    assert!(err.is_transient());
    assert!(!client.probe("/health").await);
}

#[tokio::test]
async fn test_rejected_refresh_token_is_session_expired() {
    let api = FakeApi::start().await;
    let client = ApiClient::new(&api.config()).unwrap();

    let err = client.refresh_credentials("bogus").await.unwrap_err();
    assert!(err.is_session_expired());

    let creds = client
        .refresh_credentials(common::INITIAL_REFRESH)
        .await
        .unwrap();
    assert_eq!(creds.access_token, "access-1");
    assert_eq!(creds.refresh_token, "refresh-1");
}
