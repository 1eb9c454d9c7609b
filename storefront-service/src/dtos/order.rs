use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{hex_id, iso, iso_opt};
use crate::models::{
    Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress, ShippingMethod,
    StatusHistoryEntry,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product: String,
    pub name: String,
    pub image: String,
    pub price: Decimal,
    pub quantity: u32,
    pub variant: Option<String>,
    pub subtotal: Decimal,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(i: OrderItem) -> Self {
        Self {
            product: i.product.to_hex(),
            name: i.name,
            image: i.image,
            price: i.price,
            quantity: i.quantity,
            variant: i.variant,
            subtotal: i.subtotal,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryResponse {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub updated_by: String,
    pub timestamp: String,
}

impl From<StatusHistoryEntry> for StatusHistoryResponse {
    fn from(e: StatusHistoryEntry) -> Self {
        Self {
            status: e.status,
            note: e.note,
            updated_by: e.updated_by,
            timestamp: iso(e.timestamp),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub clerk_id: Option<String>,
    pub guest_email: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub discount_code: Option<String>,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub gift_wrap_fee: Decimal,
    pub total: Decimal,
    pub shipping_address: ShippingAddress,
    pub shipping_method: ShippingMethod,
    pub is_gift: bool,
    pub gift_message: Option<String>,
    pub gift_wrapping: bool,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub stripe_payment_intent_id: Option<String>,
    pub paid_at: Option<String>,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub estimated_delivery: Option<String>,
    pub delivered_at: Option<String>,
    pub customer_notes: Option<String>,
    pub admin_notes: Option<String>,
    pub status_history: Vec<StatusHistoryResponse>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            id: hex_id(o.id),
            order_number: o.order_number,
            clerk_id: o.clerk_id,
            guest_email: o.guest_email,
            items: o.items.into_iter().map(Into::into).collect(),
            subtotal: o.subtotal,
            discount: o.discount,
            discount_code: o.discount_code,
            shipping_cost: o.shipping_cost,
            tax: o.tax,
            gift_wrap_fee: o.gift_wrap_fee,
            total: o.total,
            shipping_address: o.shipping_address,
            shipping_method: o.shipping_method,
            is_gift: o.is_gift,
            gift_message: o.gift_message,
            gift_wrapping: o.gift_wrapping,
            payment_method: o.payment_method,
            payment_status: o.payment_status,
            stripe_payment_intent_id: o.stripe_payment_intent_id,
            paid_at: iso_opt(o.paid_at),
            status: o.status,
            tracking_number: o.tracking_number,
            carrier: o.carrier,
            estimated_delivery: iso_opt(o.estimated_delivery),
            delivered_at: iso_opt(o.delivered_at),
            customer_notes: o.customer_notes,
            admin_notes: o.admin_notes,
            status_history: o.status_history.into_iter().map(Into::into).collect(),
            created_at: iso(o.created_at),
            updated_at: iso(o.updated_at),
        }
    }
}

/// Public tracking view of an order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingResponse {
    pub order_number: String,
    pub status: OrderStatus,
    pub status_history: Vec<StatusHistoryResponse>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub estimated_delivery: Option<String>,
    pub shipping_address: ShippingAddress,
    pub created_at: String,
}

impl From<Order> for TrackingResponse {
    fn from(o: Order) -> Self {
        Self {
            order_number: o.order_number,
            status: o.status,
            status_history: o.status_history.into_iter().map(Into::into).collect(),
            tracking_number: o.tracking_number,
            carrier: o.carrier,
            estimated_delivery: iso_opt(o.estimated_delivery),
            shipping_address: o.shipping_address,
            created_at: iso(o.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: u32,
    pub variant: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderLineRequest>,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub shipping_method: ShippingMethod,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub is_gift: bool,
    #[validate(length(max = 500, message = "Gift message cannot exceed 500 characters"))]
    pub gift_message: Option<String>,
    #[serde(default)]
    pub gift_wrapping: bool,
    pub discount_code: Option<String>,
    #[validate(length(max = 1000))]
    pub customer_notes: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub guest_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderIntentRequest {
    pub amount: Option<Decimal>,
    pub order_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOrderPaymentRequest {
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub status: String,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub estimated_delivery: Option<chrono::DateTime<chrono::Utc>>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_order_request_defaults() {
        let request: CreateOrderRequest = serde_json::from_value(serde_json::json!({
            "items": [{ "productId": "65f000000000000000000001", "quantity": 2 }],
            "shippingAddress": {
                "firstName": "Ada",
                "lastName": "Lovelace",
                "street": "1 Way",
                "city": "Portland",
                "state": "OR",
                "postalCode": "97201"
            },
            "guestEmail": "not-an-email"
        }))
        .unwrap();

        assert_eq!(request.shipping_method, ShippingMethod::Standard);
        assert_eq!(request.payment_method, PaymentMethod::Card);
        assert!(!request.gift_wrapping);
        assert!(request.validate().is_err());
    }

    #[test]
    fn status_update_accepts_rfc3339_delivery_estimate() {
        let request: UpdateOrderStatusRequest = serde_json::from_value(serde_json::json!({
            "status": "shipped",
            "trackingNumber": "1Z999",
            "estimatedDelivery": "2024-05-01T00:00:00Z"
        }))
        .unwrap();
        assert!(request.estimated_delivery.is_some());
        assert_eq!(request.tracking_number.as_deref(), Some("1Z999"));
    }
}
