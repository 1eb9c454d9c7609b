use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::ShippingAddress;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentCreatedResponse {
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CheckoutLine {
    pub price: Decimal,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub cart_items: Vec<CheckoutLine>,
    pub shipping_address: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub client_secret: Option<String>,
    pub payment_intent_id: Option<String>,
    pub amount: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Shipping address as the checkout form sends it: either split names or a
/// single `fullName`, and `address`/`zipCode` aliases.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutAddress {
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(alias = "address")]
    pub street: Option<String>,
    pub apartment: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(alias = "zipCode")]
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl CheckoutAddress {
    /// First name used to greet the shopper in email.
    pub fn greeting_name(&self) -> Option<String> {
        non_empty(self.first_name.clone()).or_else(|| {
            self.full_name
                .as_deref()
                .and_then(|n| n.split_whitespace().next())
                .map(str::to_string)
        })
    }

    pub fn into_shipping_address(self) -> ShippingAddress {
        let (split_first, split_last) = match self.full_name.as_deref() {
            Some(full) => {
                let mut parts = full.split_whitespace();
                let first = parts.next().map(str::to_string);
                let rest = parts.collect::<Vec<_>>().join(" ");
                (first, non_empty(Some(rest)))
            }
            None => (None, None),
        };

        ShippingAddress {
            first_name: non_empty(self.first_name)
                .or(split_first)
                .unwrap_or_else(|| "Guest".to_string()),
            last_name: non_empty(self.last_name)
                .or(split_last)
                .unwrap_or_else(|| "Customer".to_string()),
            street: self.street.unwrap_or_default(),
            apartment: non_empty(self.apartment),
            city: self.city.unwrap_or_default(),
            state: self.state.unwrap_or_default(),
            postal_code: self.postal_code.unwrap_or_default(),
            country: non_empty(self.country).unwrap_or_else(|| "United States".to_string()),
            phone: non_empty(self.phone),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmLine {
    #[serde(alias = "product", alias = "_id", alias = "id")]
    pub product_id: String,
    pub quantity: u32,
    pub variant: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub shipping_address: CheckoutAddress,
    #[serde(default)]
    pub items: Vec<ConfirmLine>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentDetails {
    pub id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub created: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub payment_intent_id: Option<String>,
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    pub refund_id: String,
    pub amount: Decimal,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_and_aliases_map_to_shipping_address() {
        let address: CheckoutAddress = serde_json::from_value(serde_json::json!({
            "fullName": "Ada King Lovelace",
            "email": "ada@example.com",
            "address": "1 Analytical Way",
            "city": "Portland",
            "state": "OR",
            "zipCode": "97201"
        }))
        .unwrap();
        assert_eq!(address.greeting_name().as_deref(), Some("Ada"));

        let shipping = address.into_shipping_address();
        assert_eq!(shipping.first_name, "Ada");
        assert_eq!(shipping.last_name, "King Lovelace");
        assert_eq!(shipping.street, "1 Analytical Way");
        assert_eq!(shipping.postal_code, "97201");
        assert_eq!(shipping.country, "United States");
    }

    #[test]
    fn missing_names_fall_back() {
        let shipping = CheckoutAddress::default().into_shipping_address();
        assert_eq!(shipping.first_name, "Guest");
        assert_eq!(shipping.last_name, "Customer");
    }

    #[test]
    fn confirm_lines_accept_id_aliases() {
        let line: ConfirmLine = serde_json::from_value(serde_json::json!({
            "_id": "65f000000000000000000001",
            "quantity": 1
        }))
        .unwrap();
        assert_eq!(line.product_id, "65f000000000000000000001");
    }
}
