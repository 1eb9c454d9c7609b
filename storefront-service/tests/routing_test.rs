//! Root banner, health checks, fallback and response headers.

mod common;

use axum::http::StatusCode;
use common::{get_request, router, send, TestApp};
use serde_json::Value;

#[tokio::test]
async fn root_returns_banner() {
    let (status, body) = send(router().await, get_request("/", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Welcome to Artisio API");
    assert_eq!(body["version"], "2.0.0");
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn readiness_probe_is_ok() {
    let (status, body) = send(router().await, get_request("/ready", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn unknown_route_is_404_with_path() {
    let (status, body) = send(router().await, get_request("/api/nope", None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Route /api/nope not found");
}

#[tokio::test]
async fn responses_carry_security_headers_and_request_id() {
    let response = tower::ServiceExt::oneshot(router().await, get_request("/", None))
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
    assert!(response.headers().contains_key("x-content-type-options"));
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn health_check_reports_database() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .expect("Failed to execute request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "storefront-service-test");
    assert_eq!(body["database"], "connected");

    app.cleanup().await;
}
