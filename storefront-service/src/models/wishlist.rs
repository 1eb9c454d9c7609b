use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub product: ObjectId,
    pub added_at: DateTime,
}

/// One wishlist per shopper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wishlist {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub clerk_id: String,
    #[serde(default)]
    pub products: Vec<WishlistEntry>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Wishlist {
    pub fn new(clerk_id: &str) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            clerk_id: clerk_id.to_string(),
            products: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn contains(&self, product: &ObjectId) -> bool {
        self.products.iter().any(|entry| &entry.product == product)
    }

    /// Returns false if the product was already listed.
    pub fn add(&mut self, product: ObjectId) -> bool {
        if self.contains(&product) {
            return false;
        }
        self.products.push(WishlistEntry {
            product,
            added_at: DateTime::now(),
        });
        self.updated_at = DateTime::now();
        true
    }

    pub fn remove(&mut self, product: &ObjectId) -> bool {
        let before = self.products.len();
        self.products.retain(|entry| &entry.product != product);
        let removed = self.products.len() != before;
        if removed {
            self.updated_at = DateTime::now();
        }
        removed
    }

    pub fn product_ids(&self) -> Vec<ObjectId> {
        self.products.iter().map(|entry| entry.product).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_and_remove_reports() {
        let mut wishlist = Wishlist::new("user_1");
        let product = ObjectId::new();

        assert!(wishlist.add(product));
        assert!(!wishlist.add(product));
        assert!(wishlist.contains(&product));
        assert_eq!(wishlist.product_ids(), vec![product]);

        assert!(wishlist.remove(&product));
        assert!(!wishlist.remove(&product));
        assert!(wishlist.products.is_empty());
    }
}
