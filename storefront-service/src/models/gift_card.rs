use chrono::{Duration, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use rand::RngCore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_AMOUNT: i64 = 5;
pub const MAX_AMOUNT: i64 = 500;
pub const VALIDITY_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GiftCardStatus {
    #[default]
    Pending,
    Active,
    PartiallyUsed,
    Depleted,
    Expired,
    Cancelled,
}

impl GiftCardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GiftCardStatus::Pending => "pending",
            GiftCardStatus::Active => "active",
            GiftCardStatus::PartiallyUsed => "partially_used",
            GiftCardStatus::Depleted => "depleted",
            GiftCardStatus::Expired => "expired",
            GiftCardStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    #[default]
    Email,
    Physical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GiftCardUsage {
    #[serde(default)]
    pub order_id: Option<ObjectId>,
    #[serde(default)]
    pub order_number: Option<String>,
    pub amount: Decimal,
    pub date: DateTime,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GiftCardError {
    #[error("This gift card has expired")]
    Expired,
    #[error("This gift card cannot be used")]
    NotUsable,
    #[error("Insufficient balance. Available: ${available:.2}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftCard {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub code: String,
    pub initial_balance: Decimal,
    pub current_balance: Decimal,
    pub sender_name: String,
    pub sender_email: String,
    pub recipient_name: String,
    pub recipient_email: String,
    #[serde(default)]
    pub message: Option<String>,
    pub design_template: String,
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
    #[serde(default)]
    pub scheduled_delivery: Option<DateTime>,
    #[serde(default)]
    pub delivered_at: Option<DateTime>,
    #[serde(default)]
    pub is_delivered: bool,
    #[serde(default)]
    pub status: GiftCardStatus,
    #[serde(default)]
    pub purchased_by: Option<String>,
    pub expires_at: DateTime,
    #[serde(default)]
    pub usage_history: Vec<GiftCardUsage>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// `ART-XXXX-XXXX-XXXX`, each segment two random bytes in uppercase hex.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let mut segment = || {
        let mut bytes = [0u8; 2];
        rng.fill_bytes(&mut bytes);
        hex::encode_upper(bytes)
    };
    format!("ART-{}-{}-{}", segment(), segment(), segment())
}

/// Codes are matched trimmed and uppercased.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn amount_in_range(amount: Decimal) -> bool {
    amount >= Decimal::from(MIN_AMOUNT) && amount <= Decimal::from(MAX_AMOUNT)
}

impl GiftCard {
    /// A freshly purchased card worth `amount`, valid for one year.
    pub fn issue(amount: Decimal) -> Self {
        let now = DateTime::now();
        Self {
            id: None,
            code: generate_code(),
            initial_balance: amount,
            current_balance: amount,
            sender_name: "Anonymous".to_string(),
            sender_email: String::new(),
            recipient_name: "Friend".to_string(),
            recipient_email: String::new(),
            message: None,
            design_template: "classic".to_string(),
            delivery_method: DeliveryMethod::Email,
            scheduled_delivery: None,
            delivered_at: None,
            is_delivered: false,
            status: GiftCardStatus::Pending,
            purchased_by: None,
            expires_at: DateTime::from_chrono(Utc::now() + Duration::days(VALIDITY_DAYS)),
            usage_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Re-derive status from balance and delivery state.
    pub fn refresh_status(&mut self) {
        if self.current_balance <= Decimal::ZERO {
            self.status = GiftCardStatus::Depleted;
        } else if self.current_balance < self.initial_balance {
            self.status = GiftCardStatus::PartiallyUsed;
        } else if self.status == GiftCardStatus::Pending && self.is_delivered {
            self.status = GiftCardStatus::Active;
        }
        self.updated_at = DateTime::now();
    }

    pub fn mark_delivered(&mut self) {
        self.is_delivered = true;
        self.delivered_at = Some(DateTime::now());
        self.refresh_status();
    }

    pub fn is_expired(&self) -> bool {
        DateTime::now() > self.expires_at
    }

    pub fn is_usable(&self) -> bool {
        self.current_balance > Decimal::ZERO
            && !self.is_expired()
            && matches!(
                self.status,
                GiftCardStatus::Active | GiftCardStatus::PartiallyUsed
            )
    }

    /// Check that `amount` can be drawn from this card right now.
    pub fn check_redeemable(&self, amount: Decimal) -> Result<(), GiftCardError> {
        if self.is_expired() {
            return Err(GiftCardError::Expired);
        }
        if !self.is_usable() {
            return Err(GiftCardError::NotUsable);
        }
        if amount > self.current_balance {
            return Err(GiftCardError::InsufficientBalance {
                available: self.current_balance,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Deduct `amount` and record it against an order.
    pub fn apply(
        &mut self,
        amount: Decimal,
        order_id: Option<ObjectId>,
        order_number: Option<String>,
    ) -> Result<Decimal, GiftCardError> {
        self.check_redeemable(amount)?;
        self.current_balance -= amount;
        self.usage_history.push(GiftCardUsage {
            order_id,
            order_number,
            amount,
            date: DateTime::now(),
        });
        self.refresh_status();
        Ok(self.current_balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_card(amount: i64) -> GiftCard {
        let mut card = GiftCard::issue(Decimal::from(amount));
        card.mark_delivered();
        card
    }

    #[test]
    fn code_shape() {
        let code = generate_code();
        assert_eq!(code.len(), 18);
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts[0], "ART");
        for part in &parts[1..] {
            assert_eq!(part.len(), 4);
            assert!(part.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        }
        assert_eq!(normalize_code("  art-ab12-cd34-ef56 "), "ART-AB12-CD34-EF56");
    }

    #[test]
    fn amount_bounds() {
        assert!(amount_in_range(Decimal::from(5)));
        assert!(amount_in_range(Decimal::from(500)));
        assert!(!amount_in_range(Decimal::new(499, 2)));
        assert!(!amount_in_range(Decimal::new(50001, 2)));
    }

    #[test]
    fn pending_until_delivered() {
        let mut card = GiftCard::issue(Decimal::from(50));
        assert_eq!(card.status, GiftCardStatus::Pending);
        assert!(!card.is_usable());
        assert_eq!(card.check_redeemable(Decimal::ONE), Err(GiftCardError::NotUsable));

        card.mark_delivered();
        assert_eq!(card.status, GiftCardStatus::Active);
        assert!(card.is_usable());
    }

    #[test]
    fn redemption_walks_balance_down() {
        let mut card = active_card(50);

        assert_eq!(card.apply(Decimal::from(20), None, Some("ART-1".into())), Ok(Decimal::from(30)));
        assert_eq!(card.status, GiftCardStatus::PartiallyUsed);

        assert_eq!(card.apply(Decimal::from(30), None, None), Ok(Decimal::ZERO));
        assert_eq!(card.status, GiftCardStatus::Depleted);
        assert_eq!(card.usage_history.len(), 2);
        assert!(!card.is_usable());
    }

    #[test]
    fn overdraw_is_rejected() {
        let mut card = active_card(10);
        let err = card.apply(Decimal::from(25), None, None).unwrap_err();
        assert_eq!(err.to_string(), "Insufficient balance. Available: $10.00");
        assert_eq!(card.current_balance, Decimal::from(10));
    }

    #[test]
    fn expired_cards_report_expiry() {
        let mut card = active_card(10);
        card.expires_at = DateTime::from_chrono(Utc::now() - Duration::days(1));
        assert!(card.is_expired());
        assert_eq!(card.check_redeemable(Decimal::ONE), Err(GiftCardError::Expired));
    }
}
