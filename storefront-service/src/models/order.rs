use chrono::Utc;
use mongodb::bson::{oid::ObjectId, DateTime};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::services::pricing::OrderQuote;

/// Order lifecycle status. Any status may follow any other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            "refunded" => Some(OrderStatus::Refunded),
            _ => None,
        }
    }

    /// Capitalised form used by the admin dashboard.
    pub fn label(&self) -> String {
        let raw = self.as_str();
        let mut chars = raw.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, OrderStatus::Cancelled | OrderStatus::Delivered)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            "partially_refunded" => Some(PaymentStatus::PartiallyRefunded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Card,
    ApplePay,
    GooglePay,
    GiftCard,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShippingMethod {
    #[default]
    Standard,
    Express,
    Overnight,
    Pickup,
}

fn default_country() -> String {
    "United States".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apartment: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ShippingAddress {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product: ObjectId,
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default)]
    pub variant: Option<String>,
    pub subtotal: Decimal,
}

impl OrderItem {
    pub fn new(
        product: ObjectId,
        name: String,
        image: String,
        price: Decimal,
        quantity: u32,
        variant: Option<String>,
    ) -> Self {
        Self {
            product,
            name,
            image,
            price,
            quantity,
            variant,
            subtotal: price * Decimal::from(quantity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
    pub updated_by: String,
    pub timestamp: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub order_number: String,
    #[serde(default)]
    pub clerk_id: Option<String>,
    #[serde(default)]
    pub guest_email: Option<String>,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub discount_code: Option<String>,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    #[serde(default)]
    pub gift_wrap_fee: Decimal,
    pub total: Decimal,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub shipping_method: ShippingMethod,
    #[serde(default)]
    pub is_gift: bool,
    #[serde(default)]
    pub gift_message: Option<String>,
    #[serde(default)]
    pub gift_wrapping: bool,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub stripe_payment_intent_id: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime>,
    #[serde(default)]
    pub delivered_at: Option<DateTime>,
    #[serde(default)]
    pub customer_notes: Option<String>,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub status_history: Vec<StatusHistoryEntry>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// `ART-YYYYMMDD-XXXXXX`: UTC date plus six random uppercase alphanumerics.
pub fn generate_order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();
    format!("ART-{}-{}", Utc::now().format("%Y%m%d"), suffix)
}

impl Order {
    /// A pending, unpaid order priced by `quote`, with the opening history
    /// entry already recorded.
    pub fn new(items: Vec<OrderItem>, quote: &OrderQuote, shipping_address: ShippingAddress) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            order_number: generate_order_number(),
            clerk_id: None,
            guest_email: None,
            items,
            subtotal: quote.subtotal,
            discount: quote.discount,
            discount_code: None,
            shipping_cost: quote.shipping,
            tax: quote.tax,
            gift_wrap_fee: quote.gift_wrap_fee,
            total: quote.total,
            shipping_address,
            shipping_method: ShippingMethod::Standard,
            is_gift: false,
            gift_message: None,
            gift_wrapping: false,
            payment_method: PaymentMethod::Card,
            payment_status: PaymentStatus::Pending,
            stripe_payment_intent_id: None,
            paid_at: None,
            status: OrderStatus::Pending,
            tracking_number: None,
            carrier: None,
            estimated_delivery: None,
            delivered_at: None,
            customer_notes: None,
            admin_notes: None,
            status_history: vec![StatusHistoryEntry {
                status: OrderStatus::Pending,
                note: Some("Order created".to_string()),
                updated_by: "system".to_string(),
                timestamp: now,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the order to `status`, recording who did it. Reaching
    /// `delivered` stamps the delivery time.
    pub fn set_status(&mut self, status: OrderStatus, note: Option<String>, updated_by: &str) {
        let now = DateTime::now();
        self.status = status;
        if status == OrderStatus::Delivered {
            self.delivered_at = Some(now);
        }
        self.status_history.push(StatusHistoryEntry {
            status,
            note: Some(note.unwrap_or_else(|| format!("Status changed to {}", status.as_str()))),
            updated_by: updated_by.to_string(),
            timestamp: now,
        });
        self.updated_at = now;
    }

    pub fn mark_paid(&mut self, payment_intent_id: Option<String>, updated_by: &str) {
        self.payment_status = PaymentStatus::Paid;
        self.paid_at = Some(DateTime::now());
        if payment_intent_id.is_some() {
            self.stripe_payment_intent_id = payment_intent_id;
        }
        self.set_status(
            OrderStatus::Confirmed,
            Some("Payment confirmed".to_string()),
            updated_by,
        );
    }

    /// Apply a refund of `amount`; anything short of the order total is a
    /// partial refund and leaves the fulfilment status alone.
    pub fn apply_refund(&mut self, amount: Decimal) {
        if amount >= self.total {
            self.payment_status = PaymentStatus::Refunded;
            self.set_status(
                OrderStatus::Refunded,
                Some("Order refunded".to_string()),
                "system",
            );
        } else {
            self.payment_status = PaymentStatus::PartiallyRefunded;
            self.status_history.push(StatusHistoryEntry {
                status: self.status,
                note: Some(format!("Partial refund of ${:.2}", amount)),
                updated_by: "system".to_string(),
                timestamp: DateTime::now(),
            });
            self.updated_at = DateTime::now();
        }
    }

    pub fn belongs_to(&self, clerk_id: &str) -> bool {
        self.clerk_id.as_deref() == Some(clerk_id)
    }

    pub fn customer_email(&self) -> Option<&str> {
        self.guest_email.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        let item = OrderItem::new(
            ObjectId::new(),
            "Wildflower Honey".to_string(),
            String::new(),
            Decimal::new(1250, 2),
            2,
            None,
        );
        let quote = OrderQuote {
            subtotal: item.subtotal,
            discount: Decimal::ZERO,
            tax: Decimal::new(200, 2),
            shipping: Decimal::new(15, 0),
            gift_wrap_fee: Decimal::ZERO,
            total: Decimal::new(4200, 2),
        };
        let mut order = Order::new(vec![item], &quote, ShippingAddress::default());
        order.clerk_id = Some("user_1".to_string());
        order
    }

    #[test]
    fn order_number_format() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ART");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn any_status_may_follow_any_other() {
        let mut order = sample_order();
        order.set_status(OrderStatus::Delivered, None, "admin");
        assert!(order.delivered_at.is_some());
        order.set_status(OrderStatus::Pending, Some("Reopened".into()), "admin");

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.status_history.len(), 3);
        assert_eq!(order.status_history[0].note.as_deref(), Some("Order created"));
        assert_eq!(order.status_history[1].note.as_deref(), Some("Status changed to delivered"));
        assert_eq!(order.status_history[2].note.as_deref(), Some("Reopened"));
        assert_eq!(order.status_history[2].updated_by, "admin");
    }

    #[test]
    fn mark_paid_confirms() {
        let mut order = sample_order();
        order.mark_paid(Some("pi_123".into()), "system");
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.paid_at.is_some());
        assert_eq!(order.stripe_payment_intent_id.as_deref(), Some("pi_123"));
    }

    #[test]
    fn partial_and_full_refunds() {
        let mut order = sample_order();
        order.mark_paid(None, "system");

        order.apply_refund(Decimal::new(10, 0));
        assert_eq!(order.payment_status, PaymentStatus::PartiallyRefunded);
        assert_eq!(order.status, OrderStatus::Confirmed);

        order.apply_refund(order.total);
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
        assert_eq!(order.status, OrderStatus::Refunded);
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(
            serde_json::to_value(PaymentStatus::PartiallyRefunded).unwrap(),
            "partially_refunded"
        );
        assert_eq!(serde_json::to_value(PaymentMethod::ApplePay).unwrap(), "apple_pay");
        assert_eq!(OrderStatus::parse("shipped"), Some(OrderStatus::Shipped));
        assert_eq!(OrderStatus::parse("lost"), None);
        assert_eq!(OrderStatus::Processing.label(), "Processing");
        assert!(!OrderStatus::Delivered.is_active());
    }

    #[test]
    fn address_country_defaults() {
        let address: ShippingAddress = serde_json::from_value(serde_json::json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "street": "1 Analytical Way",
            "city": "Portland",
            "state": "OR",
            "postalCode": "97201"
        }))
        .unwrap();
        assert_eq!(address.country, "United States");
        assert_eq!(address.full_name(), "Ada Lovelace");
    }
}
