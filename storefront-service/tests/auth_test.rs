//! Bearer token and admin checks.

mod common;

use axum::http::StatusCode;
use common::{get_request, json_request, router, send, SHOPPER_TOKEN};
use serde_json::json;

#[tokio::test]
async fn protected_route_without_token_is_401() {
    let (status, body) = send(router().await, get_request("/api/orders/my-orders", None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No token provided");
}

#[tokio::test]
async fn admin_route_rejects_shoppers() {
    let (status, body) = send(
        router().await,
        get_request("/api/admin/analytics", Some(SHOPPER_TOKEN)),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admin access required");
}

#[tokio::test]
async fn merging_carts_requires_sign_in() {
    let (status, body) = send(
        router().await,
        json_request("POST", "/api/cart/merge", None, json!({ "sessionId": "guest-1" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Authentication required");
}
