use chrono::{Duration, Utc};
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PromoDiscount;
use crate::services::pricing::{CartTotals, PriceLine, PricingPolicy};

/// Days a guest cart survives without activity.
pub const GUEST_CART_TTL_DAYS: i64 = 30;

/// Who a cart belongs to: a signed-in shopper or a guest browser session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(String),
    Guest(String),
}

impl CartOwner {
    pub fn filter(&self) -> Document {
        match self {
            CartOwner::User(clerk_id) => doc! { "clerk_id": clerk_id },
            CartOwner::Guest(session_id) => doc! { "session_id": session_id },
        }
    }

    pub fn clerk_id(&self) -> Option<&str> {
        match self {
            CartOwner::User(clerk_id) => Some(clerk_id),
            CartOwner::Guest(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub product: ObjectId,
    pub quantity: u32,
    #[serde(default)]
    pub variant: Option<String>,
    /// Unit price captured when the item was added.
    pub price: Decimal,
    pub added_at: DateTime,
}

impl CartItem {
    fn matches(&self, product: &ObjectId, variant: Option<&str>) -> bool {
        &self.product == product && self.variant.as_deref() == variant
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clerk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub promo_code: Option<PromoDiscount>,
    /// Set for guest carts only; a TTL index removes them once reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

fn guest_expiry() -> DateTime {
    DateTime::from_chrono(Utc::now() + Duration::days(GUEST_CART_TTL_DAYS))
}

impl Cart {
    pub fn new(owner: &CartOwner) -> Self {
        let now = DateTime::now();
        let (clerk_id, session_id, expires_at) = match owner {
            CartOwner::User(clerk_id) => (Some(clerk_id.clone()), None, None),
            CartOwner::Guest(session_id) => (None, Some(session_id.clone()), Some(guest_expiry())),
        };

        Self {
            id: None,
            clerk_id,
            session_id,
            items: Vec::new(),
            promo_code: None,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add `quantity` of a product, merging into an existing line for the
    /// same product and variant. Returns the line's resulting quantity.
    pub fn add_item(
        &mut self,
        product: ObjectId,
        quantity: u32,
        variant: Option<String>,
        price: Decimal,
    ) -> u32 {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|item| item.matches(&product, variant.as_deref()))
        {
            existing.quantity = existing.quantity.saturating_add(quantity);
            return existing.quantity;
        }

        self.items.push(CartItem {
            id: ObjectId::new(),
            product,
            quantity,
            variant,
            price,
            added_at: DateTime::now(),
        });
        quantity
    }

    /// Quantity the matching line would hold after adding `quantity`, or
    /// `None` when the sum does not fit.
    pub fn quantity_after_add(
        &self,
        product: &ObjectId,
        variant: Option<&str>,
        quantity: u32,
    ) -> Option<u32> {
        self.items
            .iter()
            .find(|item| item.matches(product, variant))
            .map_or(Some(quantity), |existing| existing.quantity.checked_add(quantity))
    }

    pub fn item(&self, item_id: &ObjectId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == item_id)
    }

    /// Set a line's quantity; zero removes the line. Returns false when the
    /// line does not exist.
    pub fn set_quantity(&mut self, item_id: &ObjectId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove_item(item_id);
        }

        match self.items.iter_mut().find(|item| &item.id == item_id) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn remove_item(&mut self, item_id: &ObjectId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.id != item_id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.promo_code = None;
    }

    /// Fold a guest cart's lines into this one, adding quantities for
    /// matching product and variant.
    pub fn merge_from(&mut self, guest: Cart) {
        for item in guest.items {
            self.add_item(item.product, item.quantity, item.variant, item.price);
        }
        if self.promo_code.is_none() {
            self.promo_code = guest.promo_code;
        }
    }

    /// Hand a guest cart over to a signed-in shopper.
    pub fn claim(&mut self, clerk_id: &str) {
        self.clerk_id = Some(clerk_id.to_string());
        self.session_id = None;
        self.expires_at = None;
    }

    /// Refresh bookkeeping before a write; guest carts get their expiry
    /// pushed back on every change.
    pub fn touch(&mut self) {
        self.updated_at = DateTime::now();
        if self.session_id.is_some() && self.clerk_id.is_none() {
            self.expires_at = Some(guest_expiry());
        }
    }

    pub fn price_lines(&self) -> Vec<PriceLine> {
        self.items
            .iter()
            .map(|item| PriceLine::new(item.price, item.quantity))
            .collect()
    }

    pub fn totals(&self, policy: &PricingPolicy) -> CartTotals {
        policy.cart_totals(&self.price_lines(), self.promo_code.as_ref())
    }

    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |count, item| count.saturating_add(item.quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[test]
    fn guest_cart_expires_user_cart_does_not() {
        let guest = Cart::new(&CartOwner::Guest("sess-1".to_string()));
        assert!(guest.expires_at.is_some());
        assert_eq!(guest.session_id.as_deref(), Some("sess-1"));

        let user = Cart::new(&CartOwner::User("user_1".to_string()));
        assert!(user.expires_at.is_none());
        assert_eq!(user.clerk_id.as_deref(), Some("user_1"));
    }

    #[test]
    fn same_product_and_variant_merge() {
        let mut cart = Cart::new(&CartOwner::User("user_1".to_string()));
        let product = ObjectId::new();

        assert_eq!(cart.add_item(product, 1, Some("500g".into()), price(1299)), 1);
        assert_eq!(cart.add_item(product, 2, Some("500g".into()), price(1299)), 3);
        assert_eq!(cart.add_item(product, 1, Some("1kg".into()), price(2199)), 1);

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn oversized_add_never_wraps_to_zero() {
        let mut cart = Cart::new(&CartOwner::Guest("sess".to_string()));
        let product = ObjectId::new();
        cart.add_item(product, 1, None, price(500));

        assert_eq!(cart.quantity_after_add(&product, None, 2), Some(3));
        assert_eq!(cart.quantity_after_add(&product, None, u32::MAX), None);
        assert_eq!(cart.quantity_after_add(&ObjectId::new(), None, u32::MAX), Some(u32::MAX));

        assert_eq!(cart.add_item(product, u32::MAX, None, price(500)), u32::MAX);
        assert_eq!(cart.items[0].quantity, u32::MAX);
    }

    #[test]
    fn zero_quantity_removes_line() {
        let mut cart = Cart::new(&CartOwner::User("user_1".to_string()));
        cart.add_item(ObjectId::new(), 2, None, price(500));
        let item_id = cart.items[0].id;

        assert!(cart.set_quantity(&item_id, 5));
        assert_eq!(cart.items[0].quantity, 5);

        assert!(cart.set_quantity(&item_id, 0));
        assert!(cart.items.is_empty());
        assert!(!cart.set_quantity(&item_id, 1));
    }

    #[test]
    fn clear_drops_promo() {
        let mut cart = Cart::new(&CartOwner::User("user_1".to_string()));
        cart.add_item(ObjectId::new(), 1, None, price(500));
        cart.promo_code = PromoDiscount::lookup("SAVE5");

        cart.clear();
        assert!(cart.items.is_empty());
        assert!(cart.promo_code.is_none());
    }

    #[test]
    fn merge_adds_quantities_and_keeps_distinct_lines() {
        let shared = ObjectId::new();
        let mut user = Cart::new(&CartOwner::User("user_1".to_string()));
        user.add_item(shared, 1, None, price(1000));

        let mut guest = Cart::new(&CartOwner::Guest("sess".to_string()));
        guest.add_item(shared, 2, None, price(1000));
        guest.add_item(ObjectId::new(), 1, None, price(250));
        guest.promo_code = PromoDiscount::lookup("WELCOME10");

        user.merge_from(guest);
        assert_eq!(user.items.len(), 2);
        assert_eq!(user.items[0].quantity, 3);
        assert_eq!(user.promo_code.unwrap().code, "WELCOME10");
    }

    #[test]
    fn claim_removes_guest_identity() {
        let mut cart = Cart::new(&CartOwner::Guest("sess".to_string()));
        cart.claim("user_9");
        assert_eq!(cart.clerk_id.as_deref(), Some("user_9"));
        assert!(cart.session_id.is_none());
        assert!(cart.expires_at.is_none());
    }

    #[test]
    fn totals_use_captured_prices() {
        let mut cart = Cart::new(&CartOwner::User("user_1".to_string()));
        cart.add_item(ObjectId::new(), 2, None, price(2999));
        cart.add_item(ObjectId::new(), 1, None, price(1000));

        let totals = cart.totals(&PricingPolicy::default());
        assert_eq!(totals.subtotal, price(6998));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.tax, price(560));
        assert_eq!(totals.total, price(7558));
    }
}
