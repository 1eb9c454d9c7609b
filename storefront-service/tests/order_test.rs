//! Order placement, tracking and fulfilment.

mod common;

use common::{create_product, shipping_address, TestApp, ADMIN_TOKEN, SHOPPER_TOKEN};
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use storefront_service::models::{Order, ShippingAddress};
use storefront_service::services::database::is_duplicate_key_error;
use storefront_service::services::pricing::OrderQuote;

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn order_is_repriced_and_trackable() {
    let app = TestApp::spawn().await;
    let product = create_product(&app, "Espresso Beans", 20.0, 10).await;

    let response = app
        .client
        .post(app.url("/api/orders"))
        .header("authorization", SHOPPER_TOKEN)
        .json(&json!({
            "items": [{ "productId": product, "quantity": 3 }],
            "shippingAddress": shipping_address(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let created: Value = response.json().await.unwrap();
    let order = &created["data"];
    assert_eq!(order["subtotal"], 60.0);
    assert_eq!(order["tax"], 4.8);
    assert_eq!(order["status"], "pending");
    let order_number = order["orderNumber"].as_str().unwrap().to_string();
    let order_id = order["id"].as_str().unwrap().to_string();

    let tracked: Value = app
        .client
        .get(app.url(&format!("/api/orders/track/{}", order_number)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tracked["data"]["orderNumber"], order_number);

    let stranger = app
        .client
        .get(app.url(&format!("/api/orders/{}", order_id)))
        .header("authorization", "Bearer clerkId:user_someone_else")
        .send()
        .await
        .unwrap();
    assert_eq!(stranger.status().as_u16(), 403);

    let shipped = app
        .client
        .put(app.url(&format!("/api/admin/orders/{}/status", order_id)))
        .header("authorization", ADMIN_TOKEN)
        .json(&json!({ "status": "shipped", "trackingNumber": "1Z999", "carrier": "UPS" }))
        .send()
        .await
        .unwrap();
    assert!(shipped.status().is_success());

    let stored = app
        .db
        .order_by_id(&ObjectId::parse_str(&order_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    let entry = stored.status_history.last().unwrap();
    assert_eq!(entry.updated_by, "admin");

    let mine: Value = app
        .client
        .get(app.url("/api/orders/my-orders"))
        .header("authorization", SHOPPER_TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine["count"], 1);
    assert_eq!(mine["data"][0]["status"], "shipped");
    assert_eq!(mine["data"][0]["trackingNumber"], "1Z999");

    app.cleanup().await;
}

fn paid_order(payment_intent_id: Option<&str>) -> Order {
    let quote = OrderQuote {
        subtotal: Decimal::new(2000, 2),
        discount: Decimal::ZERO,
        tax: Decimal::new(160, 2),
        shipping: Decimal::new(15, 0),
        gift_wrap_fee: Decimal::ZERO,
        total: Decimal::new(3660, 2),
    };
    let mut order = Order::new(Vec::new(), &quote, ShippingAddress::default());
    order.mark_paid(payment_intent_id.map(str::to_string), "system");
    order
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn one_order_per_payment_intent() {
    let app = TestApp::spawn().await;

    app.db.insert_order(&mut paid_order(Some("pi_twice"))).await.unwrap();
    let err = app
        .db
        .insert_order(&mut paid_order(Some("pi_twice")))
        .await
        .unwrap_err();
    assert!(is_duplicate_key_error(&err));

    // Orders still awaiting payment carry no intent and never collide.
    app.db.insert_order(&mut paid_order(None)).await.unwrap();
    app.db.insert_order(&mut paid_order(None)).await.unwrap();

    app.cleanup().await;
}
