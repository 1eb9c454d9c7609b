#![allow(dead_code)]

use axum::{body::Body, http::Request, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use storefront_service::config::Config;
use storefront_service::services::StorefrontDb;
use storefront_service::{build_router, AppState, Application};
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "Bearer clerkId:user_admin";
pub const SHOPPER_TOKEN: &str = "Bearer clerkId:user_shopper";

fn mongo_uri() -> String {
    std::env::var("TEST_MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
}

fn test_config() -> (Config, String) {
    let db_name = format!("storefront_test_{}", uuid::Uuid::new_v4().simple());
    (Config::for_tests(&mongo_uri(), &db_name), db_name)
}

/// In-process router. The MongoDB client connects lazily, so requests
/// that never reach the database work without a server.
pub async fn router() -> Router {
    let (config, _) = test_config();
    let state = AppState::new(config)
        .await
        .expect("Failed to build application state");
    build_router(state)
}

/// Send one request through the router and decode the JSON body.
pub async fn send(router: Router, request: Request<Body>) -> (axum::http::StatusCode, serde_json::Value) {
    let response = router.oneshot(request).await.expect("Request failed");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Body is not JSON")
    };
    (status, body)
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", token);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", token);
    }
    builder.body(Body::empty()).expect("Failed to build request")
}

/// A running server on a random port backed by a throwaway database.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub db: StorefrontDb,
    pub db_name: String,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let (config, db_name) = test_config();

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.http_port();
        let address = format!("http://127.0.0.1:{}", port);
        let db = app.db().clone();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        let ready_url = format!("{}/ready", address);
        for _ in 0..50 {
            if client.get(&ready_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            db,
            db_name,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Drop the test database.
    pub async fn cleanup(&self) {
        self.db
            .database()
            .drop(None)
            .await
            .expect("Failed to drop test database");
    }
}

/// Create a product through the admin API and return its id.
pub async fn create_product(app: &TestApp, name: &str, price: f64, stock: i64) -> String {
    let response = app
        .client
        .post(app.url("/api/admin/products"))
        .header("authorization", ADMIN_TOKEN)
        .json(&json!({
            "name": name,
            "description": "Small batch, roasted weekly",
            "price": price,
            "category": "Coffee",
            "artisan": "Highland Roasters",
            "stock": stock,
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);

    let body: Value = response.json().await.expect("Failed to parse JSON");
    body["data"]["id"].as_str().expect("product id").to_string()
}

pub fn shipping_address() -> Value {
    json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "street": "12 Analytical Way",
        "city": "Portland",
        "state": "OR",
        "postalCode": "97201",
    })
}
