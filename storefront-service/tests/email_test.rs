//! Transactional email endpoints with mail disabled.

mod common;

use axum::http::StatusCode;
use common::{json_request, router, send};
use serde_json::json;

#[tokio::test]
async fn contact_form_requires_name_email_and_message() {
    let (status, body) = send(
        router().await,
        json_request("POST", "/api/email/contact", None, json!({ "name": "Ada" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Name, email, and message are required");
}

#[tokio::test]
async fn test_email_is_logged_when_mail_is_disabled() {
    let (status, body) = send(
        router().await,
        json_request(
            "POST",
            "/api/email/test",
            None,
            json!({ "email": "ops@example.com" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Test email sent successfully!");
}
