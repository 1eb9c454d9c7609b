//! Image upload routes. Cloudinary is never reached here.

mod common;

use axum::http::StatusCode;
use common::{json_request, router, send, ADMIN_TOKEN, SHOPPER_TOKEN};
use serde_json::json;

#[tokio::test]
async fn bulk_delete_requires_public_ids() {
    let (status, body) = send(
        router().await,
        json_request(
            "POST",
            "/api/upload/delete-multiple",
            Some(ADMIN_TOKEN),
            json!({ "publicIds": [] }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Public IDs array is required");
}

#[tokio::test]
async fn uploads_are_admin_only() {
    let (status, body) = send(
        router().await,
        json_request(
            "POST",
            "/api/upload/delete-multiple",
            Some(SHOPPER_TOKEN),
            json!({ "publicIds": ["artisio/products/a"] }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admin access required");
}
