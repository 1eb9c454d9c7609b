//! Catalog reads and admin product writes.

mod common;

use axum::http::StatusCode;
use common::{create_product, json_request, router, send, TestApp, ADMIN_TOKEN};
use serde_json::{json, Value};

#[tokio::test]
async fn admin_product_create_validates_before_saving() {
    let (status, body) = send(
        router().await,
        json_request(
            "POST",
            "/api/admin/products",
            Some(ADMIN_TOKEN),
            json!({
                "name": "",
                "description": "Small batch",
                "price": -1,
                "category": "Coffee",
                "artisan": "Ada",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation error");
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn catalog_lists_created_products_by_slug() {
    let app = TestApp::spawn().await;
    create_product(&app, "Dark Roast", 18.0, 40).await;
    create_product(&app, "Light Roast", 16.0, 40).await;

    let listed: Value = app
        .client
        .get(app.url("/api/products?keyword=dark"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed = listed.as_array().expect("bare array");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["slug"], "dark-roast");

    let by_slug = app
        .client
        .get(app.url("/api/products/light-roast"))
        .send()
        .await
        .unwrap();
    assert!(by_slug.status().is_success());

    let missing = app
        .client
        .get(app.url("/api/products/no-such-thing"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    app.cleanup().await;
}
