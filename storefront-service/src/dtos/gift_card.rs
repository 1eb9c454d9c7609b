use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::iso;
use crate::models::{DeliveryMethod, GiftCard, GiftCardStatus};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseGiftCardRequest {
    pub amount: Option<Decimal>,
    pub sender_name: Option<String>,
    #[validate(email(message = "Please provide a valid sender email"))]
    pub sender_email: Option<String>,
    pub recipient_name: Option<String>,
    #[validate(email(message = "Please provide a valid recipient email"))]
    pub recipient_email: Option<String>,
    #[validate(length(max = 500, message = "Message cannot exceed 500 characters"))]
    pub message: Option<String>,
    pub delivery_method: Option<DeliveryMethod>,
    pub scheduled_delivery: Option<chrono::DateTime<chrono::Utc>>,
    pub design_template: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftCardCreated {
    pub id: String,
    pub code: String,
    pub amount: Decimal,
    pub recipient_email: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftCardBalance {
    pub code: String,
    pub balance: Decimal,
    pub initial_balance: Decimal,
    pub status: GiftCardStatus,
    pub expires_at: String,
    pub is_usable: bool,
}

impl From<&GiftCard> for GiftCardBalance {
    fn from(card: &GiftCard) -> Self {
        Self {
            code: card.code.clone(),
            balance: card.current_balance,
            initial_balance: card.initial_balance,
            status: card.status,
            expires_at: iso(card.expires_at),
            is_usable: card.is_usable(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemGiftCardRequest {
    pub code: Option<String>,
    pub amount: Option<Decimal>,
    pub order_id: Option<String>,
    pub order_number: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionResponse {
    pub code: String,
    pub amount_applied: Decimal,
    pub remaining_balance: Decimal,
    pub status: GiftCardStatus,
}

#[derive(Debug, Deserialize)]
pub struct ValidateGiftCardRequest {
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftCardSummary {
    pub id: String,
    pub code: String,
    pub balance: Decimal,
    pub initial_balance: Decimal,
    pub recipient_name: String,
    pub recipient_email: String,
    pub status: GiftCardStatus,
    pub expires_at: String,
    pub created_at: String,
}

impl From<GiftCard> for GiftCardSummary {
    fn from(card: GiftCard) -> Self {
        Self {
            id: super::hex_id(card.id),
            code: card.code,
            balance: card.current_balance,
            initial_balance: card.initial_balance,
            recipient_name: card.recipient_name,
            recipient_email: card.recipient_email,
            status: card.status,
            expires_at: iso(card.expires_at),
            created_at: iso(card.created_at),
        }
    }
}
