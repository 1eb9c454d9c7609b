use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{iso, ProductSummary};
use crate::models::{Cart, Product, PromoDiscount};
use crate::services::pricing::{CartTotals, PricingPolicy};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemResponse {
    pub id: String,
    pub product_id: String,
    /// Absent when the product has since been deleted.
    pub product: Option<ProductSummary>,
    pub quantity: u32,
    pub variant: Option<String>,
    pub price: Decimal,
    pub added_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub items: Vec<CartItemResponse>,
    pub promo_code: Option<PromoDiscount>,
    #[serde(flatten)]
    pub totals: CartTotals,
    /// Number of distinct lines.
    pub count: usize,
}

impl CartResponse {
    pub fn empty(policy: &PricingPolicy) -> Self {
        Self {
            items: Vec::new(),
            promo_code: None,
            totals: CartTotals::empty(policy),
            count: 0,
        }
    }

    pub fn build(cart: &Cart, products: &HashMap<ObjectId, Product>, policy: &PricingPolicy) -> Self {
        let items = cart
            .items
            .iter()
            .map(|item| CartItemResponse {
                id: item.id.to_hex(),
                product_id: item.product.to_hex(),
                product: products.get(&item.product).map(ProductSummary::from),
                quantity: item.quantity,
                variant: item.variant.clone(),
                price: item.price,
                added_at: iso(item.added_at),
            })
            .collect::<Vec<_>>();

        Self {
            count: items.len(),
            items,
            promo_code: cart.promo_code.clone(),
            totals: cart.totals(policy),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: Option<String>,
    pub quantity: Option<i64>,
    pub variant: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct PromoRequest {
    pub code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCartRequest {
    pub session_id: Option<String>,
}
