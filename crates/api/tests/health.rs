//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, legacy_app, Creds};

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let app = legacy_app();
    let response = get(&app, "/health", &Creds::none()).await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["store_healthy"], true);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = legacy_app();
    let response = get(&app, "/this-route-does-not-exist", &Creds::none()).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = legacy_app();
    let response = get(&app, "/health", &Creds::none()).await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");

    // MakeRequestUuid produces a hyphenated UUID.
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn supplied_request_id_is_propagated() {
    let app = legacy_app();
    let request = axum::http::Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-me-123")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = common::send(&app, request).await;

    assert_eq!(response.headers()["x-request-id"], "trace-me-123");
}
