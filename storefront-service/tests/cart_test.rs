//! Guest and shopper carts.

mod common;

use axum::http::StatusCode;
use common::{create_product, get_request, router, send, TestApp, SHOPPER_TOKEN};
use serde_json::{json, Value};

#[tokio::test]
async fn guest_without_session_sees_empty_cart() {
    let (status, body) = send(router().await, get_request("/api/cart", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["items"], json!([]));
    assert_eq!(body["data"]["total"], 0.0);
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn guest_cart_merges_into_user_cart() {
    let app = TestApp::spawn().await;
    let product = create_product(&app, "House Blend", 12.0, 20).await;

    for (session, token) in [(Some("guest-42"), None), (None, Some(SHOPPER_TOKEN))] {
        let mut request = app
            .client
            .post(app.url("/api/cart"))
            .json(&json!({ "productId": product, "quantity": 2 }));
        if let Some(session) = session {
            request = request.header("x-session-id", session);
        }
        if let Some(token) = token {
            request = request.header("authorization", token);
        }
        let response = request.send().await.unwrap();
        assert!(response.status().is_success());
    }

    let merged: Value = app
        .client
        .post(app.url("/api/cart/merge"))
        .header("authorization", SHOPPER_TOKEN)
        .json(&json!({ "sessionId": "guest-42" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(merged["message"], "Carts merged successfully");
    assert_eq!(merged["data"]["items"][0]["quantity"], 4);

    let stock_error = app
        .client
        .post(app.url("/api/cart"))
        .header("authorization", SHOPPER_TOKEN)
        .json(&json!({ "productId": product, "quantity": 50 }))
        .send()
        .await
        .unwrap();
    assert_eq!(stock_error.status().as_u16(), 400);

    app.cleanup().await;
}
