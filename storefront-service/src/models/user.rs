use mongodb::bson::{oid::ObjectId, DateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoyaltyTier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl LoyaltyTier {
    pub fn from_spent(total_spent: Decimal) -> Self {
        if total_spent >= Decimal::from(5000) {
            LoyaltyTier::Platinum
        } else if total_spent >= Decimal::from(2000) {
            LoyaltyTier::Gold
        } else if total_spent >= Decimal::from(500) {
            LoyaltyTier::Silver
        } else {
            LoyaltyTier::Bronze
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub dietary: Vec<String>,
    #[serde(default)]
    pub allergens: Vec<String>,
    #[serde(default)]
    pub favorite_categories: Vec<String>,
    #[serde(default = "default_true")]
    pub newsletter: bool,
    #[serde(default)]
    pub sms_notifications: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dietary: Vec::new(),
            allergens: Vec::new(),
            favorite_categories: Vec::new(),
            newsletter: true,
            sms_notifications: false,
        }
    }
}

fn default_label() -> String {
    "Home".to_string()
}

fn default_country() -> String {
    "United States".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default = "default_label")]
    pub label: String,
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    #[serde(default)]
    pub apartment: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub clerk_id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub loyalty_points: i64,
    #[serde(default)]
    pub loyalty_tier: LoyaltyTier,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub total_orders: i64,
    #[serde(default)]
    pub total_spent: Decimal,
    #[serde(default)]
    pub last_login_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl User {
    pub fn new(clerk_id: &str, email: &str) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            clerk_id: clerk_id.to_string(),
            email: email.trim().to_lowercase(),
            first_name: String::new(),
            last_name: String::new(),
            avatar: String::new(),
            phone: String::new(),
            addresses: Vec::new(),
            loyalty_points: 0,
            loyalty_tier: LoyaltyTier::Bronze,
            preferences: Preferences::default(),
            total_orders: 0,
            total_spent: Decimal::ZERO,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Credit a completed order: one loyalty point per whole dollar.
    pub fn record_purchase(&mut self, total: Decimal) {
        self.total_orders += 1;
        self.total_spent += total;
        self.loyalty_points += total.floor().to_i64().unwrap_or(0);
        self.loyalty_tier = LoyaltyTier::from_spent(self.total_spent);
        self.updated_at = DateTime::now();
    }

    /// Add an address. The first address, or one flagged default, becomes
    /// the only default.
    pub fn add_address(&mut self, mut address: Address) {
        if self.addresses.is_empty() {
            address.is_default = true;
        }
        if address.is_default {
            for existing in &mut self.addresses {
                existing.is_default = false;
            }
        }
        self.addresses.push(address);
        self.updated_at = DateTime::now();
    }

    pub fn remove_address(&mut self, address_id: &ObjectId) -> bool {
        let before = self.addresses.len();
        self.addresses.retain(|a| &a.id != address_id);
        let removed = self.addresses.len() != before;

        if removed && !self.addresses.iter().any(|a| a.is_default) {
            if let Some(first) = self.addresses.first_mut() {
                first.is_default = true;
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(is_default: bool) -> Address {
        Address {
            id: ObjectId::new(),
            label: default_label(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            street: "1 Analytical Way".into(),
            apartment: None,
            city: "Portland".into(),
            state: "OR".into(),
            postal_code: "97201".into(),
            country: default_country(),
            phone: None,
            is_default,
        }
    }

    #[test]
    fn tier_thresholds() {
        assert_eq!(LoyaltyTier::from_spent(Decimal::new(49999, 2)), LoyaltyTier::Bronze);
        assert_eq!(LoyaltyTier::from_spent(Decimal::from(500)), LoyaltyTier::Silver);
        assert_eq!(LoyaltyTier::from_spent(Decimal::from(2000)), LoyaltyTier::Gold);
        assert_eq!(LoyaltyTier::from_spent(Decimal::from(5000)), LoyaltyTier::Platinum);
    }

    #[test]
    fn purchase_updates_stats_and_tier() {
        let mut user = User::new("user_1", " Ada@Example.COM ");
        assert_eq!(user.email, "ada@example.com");

        user.record_purchase(Decimal::new(49999, 2));
        assert_eq!(user.total_orders, 1);
        assert_eq!(user.loyalty_points, 499);
        assert_eq!(user.loyalty_tier, LoyaltyTier::Bronze);

        user.record_purchase(Decimal::new(150, 2));
        assert_eq!(user.total_orders, 2);
        assert_eq!(user.total_spent, Decimal::new(50149, 2));
        assert_eq!(user.loyalty_points, 500);
        assert_eq!(user.loyalty_tier, LoyaltyTier::Silver);
    }

    #[test]
    fn first_address_becomes_default_and_new_default_wins() {
        let mut user = User::new("user_1", "a@b.c");
        user.add_address(address(false));
        assert!(user.addresses[0].is_default);

        user.add_address(address(false));
        assert!(!user.addresses[1].is_default);

        user.add_address(address(true));
        let defaults: Vec<bool> = user.addresses.iter().map(|a| a.is_default).collect();
        assert_eq!(defaults, vec![false, false, true]);
    }

    #[test]
    fn removing_default_promotes_first() {
        let mut user = User::new("user_1", "a@b.c");
        user.add_address(address(true));
        user.add_address(address(false));
        let default_id = user.addresses[0].id;

        assert!(user.remove_address(&default_id));
        assert!(user.addresses[0].is_default);
        assert!(!user.remove_address(&default_id));
    }

    #[test]
    fn preferences_default_to_newsletter() {
        let prefs: Preferences = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(prefs.newsletter);
        assert!(!prefs.sms_notifications);
    }
}
