use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{hex_id, iso, iso_opt};
use crate::models::{Address, LoyaltyTier, Preferences, User};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressResponse {
    pub id: String,
    pub label: String,
    pub first_name: String,
    pub last_name: String,
    pub street: String,
    pub apartment: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_default: bool,
}

impl From<Address> for AddressResponse {
    fn from(a: Address) -> Self {
        Self {
            id: a.id.to_hex(),
            label: a.label,
            first_name: a.first_name,
            last_name: a.last_name,
            street: a.street,
            apartment: a.apartment,
            city: a.city,
            state: a.state,
            postal_code: a.postal_code,
            country: a.country,
            phone: a.phone,
            is_default: a.is_default,
        }
    }
}

pub fn address_list(addresses: Vec<Address>) -> Vec<AddressResponse> {
    addresses.into_iter().map(Into::into).collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub clerk_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: String,
    pub phone: String,
    pub addresses: Vec<AddressResponse>,
    pub loyalty_points: i64,
    pub loyalty_tier: LoyaltyTier,
    pub preferences: Preferences,
    pub total_orders: i64,
    pub total_spent: Decimal,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: hex_id(u.id),
            clerk_id: u.clerk_id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            avatar: u.avatar,
            phone: u.phone,
            addresses: address_list(u.addresses),
            loyalty_points: u.loyalty_points,
            loyalty_tier: u.loyalty_tier,
            preferences: u.preferences,
            total_orders: u.total_orders,
            total_spent: u.total_spent,
            last_login_at: iso_opt(u.last_login_at),
            created_at: iso(u.created_at),
            updated_at: iso(u.updated_at),
        }
    }
}

/// Profile fields a shopper may change about themselves.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(max = 50))]
    pub first_name: Option<String>,
    #[validate(length(max = 50))]
    pub last_name: Option<String>,
    pub avatar: Option<String>,
    pub phone: Option<String>,
    pub preferences: Option<Preferences>,
}

impl UpdateProfileRequest {
    pub fn apply(self, user: &mut User) {
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(avatar) = self.avatar {
            user.avatar = avatar;
        }
        if let Some(phone) = self.phone {
            user.phone = phone;
        }
        if let Some(preferences) = self.preferences {
            user.preferences = preferences;
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    pub label: Option<String>,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    pub apartment: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
    pub country: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl From<AddressRequest> for Address {
    fn from(r: AddressRequest) -> Self {
        Address {
            id: mongodb::bson::oid::ObjectId::new(),
            label: r.label.unwrap_or_else(|| "Home".to_string()),
            first_name: r.first_name,
            last_name: r.last_name,
            street: r.street,
            apartment: r.apartment,
            city: r.city,
            state: r.state,
            postal_code: r.postal_code,
            country: r.country.unwrap_or_else(|| "United States".to_string()),
            phone: r.phone,
            is_default: r.is_default,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClerkEmailAddress {
    pub email_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClerkPhoneNumber {
    pub phone_number: String,
}

/// User object as Clerk sends it in webhooks and the sync call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClerkUserData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<ClerkEmailAddress>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub phone_numbers: Vec<ClerkPhoneNumber>,
}

impl ClerkUserData {
    pub fn primary_email(&self) -> Option<&str> {
        self.email_addresses
            .first()
            .map(|e| e.email_address.as_str())
            .filter(|e| !e.is_empty())
    }

    /// Copy Clerk's profile fields onto a stored user.
    pub fn apply(&self, user: &mut User) {
        if let Some(email) = self.primary_email() {
            user.email = email.trim().to_lowercase();
        }
        user.first_name = self.first_name.clone().unwrap_or_default();
        user.last_name = self.last_name.clone().unwrap_or_default();
        user.avatar = self.image_url.clone().unwrap_or_default();
        if let Some(phone) = self.phone_numbers.first() {
            user.phone = phone.phone_number.clone();
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ClerkWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clerk_payload_populates_user() {
        let data: ClerkUserData = serde_json::from_value(serde_json::json!({
            "id": "user_2abc",
            "email_addresses": [{ "email_address": "Ada@Example.com" }],
            "first_name": "Ada",
            "last_name": null,
            "image_url": "https://img.clerk.com/a.png",
            "phone_numbers": [{ "phone_number": "+15550100" }]
        }))
        .unwrap();

        let mut user = User::new(&data.id, "placeholder@example.com");
        data.apply(&mut user);
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.first_name, "Ada");
        assert_eq!(user.last_name, "");
        assert_eq!(user.phone, "+15550100");
    }

    #[test]
    fn profile_update_ignores_absent_fields() {
        let mut user = User::new("user_1", "a@example.com");
        user.first_name = "Ada".into();
        let update: UpdateProfileRequest =
            serde_json::from_value(serde_json::json!({ "lastName": "Lovelace" })).unwrap();
        update.apply(&mut user);
        assert_eq!(user.first_name, "Ada");
        assert_eq!(user.last_name, "Lovelace");
    }
}
