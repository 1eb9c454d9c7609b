//! Stripe-backed payment routes.

mod common;

use axum::http::StatusCode;
use common::{json_request, router, send};
use serde_json::json;

#[tokio::test]
async fn payment_intent_rejects_non_positive_amount() {
    let (status, body) = send(
        router().await,
        json_request("POST", "/api/payment/create-intent", None, json!({ "amount": 0 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid amount");
}

#[tokio::test]
async fn stripe_webhook_requires_signature() {
    let (status, body) = send(
        router().await,
        json_request("POST", "/api/payment/webhook", None, json!({ "type": "ping" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}
