//! Gift card purchase, balance lookup and redemption.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{
    created, iso, ApiResponse, GiftCardBalance, GiftCardCreated, GiftCardSummary,
    PurchaseGiftCardRequest, RedeemGiftCardRequest, RedemptionResponse, ValidateGiftCardRequest,
};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::gift_card::{amount_in_range, normalize_code};
use crate::models::{DeliveryMethod, GiftCard, GiftCardError, GiftCardStatus};
use crate::services::database::is_duplicate_key;
use crate::services::metrics::record_gift_card_redemption;
use crate::AppState;

/// Attempts at the conditional balance update before giving up on a card
/// that keeps changing underneath us.
const REDEEM_ATTEMPTS: usize = 3;

/// Attempts at inserting a card before giving up on code collisions.
const ISSUE_ATTEMPTS: usize = 5;

fn failure(status: StatusCode, message: impl Into<String>, data: Value) -> Response {
    (
        status,
        Json(json!({ "success": false, "message": message.into(), "data": data })),
    )
        .into_response()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn find_by_code(state: &AppState, code: &str) -> Result<Option<GiftCard>, AppError> {
    Ok(state
        .db
        .gift_cards()
        .find_one(doc! { "code": normalize_code(code) }, None)
        .await?)
}

/// Buy a gift card. Cards without a future delivery date are activated and,
/// for email delivery, sent to the recipient straight away.
pub async fn purchase(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(payload): Json<PurchaseGiftCardRequest>,
) -> Result<(StatusCode, ApiResponse<GiftCardCreated>), AppError> {
    let amount = payload
        .amount
        .filter(|a| amount_in_range(*a))
        .ok_or_else(|| AppError::bad_request("Gift card amount must be between $5 and $500"))?;
    payload.validate()?;

    let recipient_email = non_empty(payload.recipient_email.clone())
        .ok_or_else(|| AppError::bad_request("Recipient email is required"))?;

    let scheduled = payload
        .scheduled_delivery
        .filter(|at| *at > chrono::Utc::now())
        .map(DateTime::from_chrono);

    let mut card = GiftCard::issue(amount);
    if let Some(name) = non_empty(payload.sender_name) {
        card.sender_name = name;
    }
    card.sender_email = non_empty(payload.sender_email).unwrap_or_default();
    if let Some(name) = non_empty(payload.recipient_name) {
        card.recipient_name = name;
    }
    card.recipient_email = recipient_email.to_lowercase();
    card.message = non_empty(payload.message);
    if let Some(template) = non_empty(payload.design_template) {
        card.design_template = template;
    }
    card.delivery_method = payload.delivery_method.unwrap_or_default();
    card.scheduled_delivery = scheduled;
    card.purchased_by = Some(user.clerk_id.clone());
    if scheduled.is_none() {
        card.mark_delivered();
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        match state.db.gift_cards().insert_one(&card, None).await {
            Ok(result) => {
                card.id = result.inserted_id.as_object_id();
                break;
            }
            Err(e) if is_duplicate_key(&e) && attempt < ISSUE_ATTEMPTS => {
                tracing::warn!(attempt, "Gift card code collision; regenerating");
                card.code = crate::models::gift_card::generate_code();
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        code = %card.code,
        amount = %amount,
        purchased_by = %user.clerk_id,
        scheduled = scheduled.is_some(),
        "Gift card issued"
    );

    if scheduled.is_none() && card.delivery_method == DeliveryMethod::Email {
        if let Err(e) = state.email.send_gift_card(&card).await {
            tracing::warn!(error = %e, code = %card.code, "Gift card email not sent");
        }
    }

    Ok(created(ApiResponse::with_message(
        GiftCardCreated {
            id: crate::dtos::hex_id(card.id),
            code: card.code,
            amount: card.initial_balance,
            recipient_email: card.recipient_email,
            expires_at: iso(card.expires_at),
        },
        "Gift card created successfully",
    )))
}

pub async fn balance(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    let card = find_by_code(&state, &code).await?.ok_or_else(|| {
        AppError::not_found("Gift card not found. Please check the code and try again.")
    })?;

    if card.is_expired() {
        if card.status != GiftCardStatus::Expired {
            state
                .db
                .gift_cards()
                .update_one(
                    doc! { "_id": card.id },
                    doc! { "$set": { "status": GiftCardStatus::Expired.as_str(), "updated_at": DateTime::now() } },
                    None,
                )
                .await?;
        }
        return Ok(failure(
            StatusCode::BAD_REQUEST,
            GiftCardError::Expired.to_string(),
            json!({
                "code": card.code,
                "balance": 0,
                "status": GiftCardStatus::Expired,
                "expiredAt": iso(card.expires_at),
            }),
        ));
    }

    Ok(ApiResponse::ok(GiftCardBalance::from(&card)).into_response())
}

fn redemption_failure(err: GiftCardError, card: &GiftCard) -> Response {
    let data = match &err {
        GiftCardError::InsufficientBalance {
            available,
            requested,
        } => json!({ "availableBalance": available, "requestedAmount": requested }),
        GiftCardError::Expired | GiftCardError::NotUsable => {
            json!({ "status": card.status, "balance": card.current_balance })
        }
    };
    failure(StatusCode::BAD_REQUEST, err.to_string(), data)
}

/// Draw an amount from a card.
///
/// The write only lands if the balance is still the one we read, so two
/// concurrent redemptions can never overdraw a card.
pub async fn redeem(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(payload): Json<RedeemGiftCardRequest>,
) -> Result<Response, AppError> {
    let (Some(code), Some(amount)) = (non_empty(payload.code), payload.amount) else {
        return Err(AppError::bad_request("Gift card code and amount are required"));
    };
    if amount <= Decimal::ZERO {
        return Err(AppError::bad_request("Amount must be greater than zero"));
    }
    let order_id = payload
        .order_id
        .as_deref()
        .and_then(|id| ObjectId::parse_str(id.trim()).ok());

    for attempt in 1..=REDEEM_ATTEMPTS {
        let mut card = find_by_code(&state, &code)
            .await?
            .ok_or_else(|| AppError::not_found("Gift card not found"))?;
        let id = card
            .id
            .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("Gift card has no id")))?;
        let previous_balance = mongodb::bson::to_bson(&card.current_balance)?;

        let remaining = match card.apply(amount, order_id, payload.order_number.clone()) {
            Ok(remaining) => remaining,
            Err(err) => {
                tracing::info!(code = %card.code, reason = %err, "Gift card redemption refused");
                return Ok(redemption_failure(err, &card));
            }
        };

        let result = state
            .db
            .gift_cards()
            .replace_one(
                doc! { "_id": id, "current_balance": previous_balance },
                &card,
                None,
            )
            .await?;

        if result.modified_count == 1 {
            record_gift_card_redemption();
            tracing::info!(
                code = %card.code,
                amount = %amount,
                remaining = %remaining,
                redeemed_by = %user.clerk_id,
                "Gift card redeemed"
            );
            return Ok(ApiResponse::with_message(
                RedemptionResponse {
                    code: card.code,
                    amount_applied: amount,
                    remaining_balance: remaining,
                    status: card.status,
                },
                format!("${:.2} applied from gift card", amount),
            )
            .into_response());
        }

        tracing::warn!(code = %card.code, attempt, "Gift card balance changed during redemption; retrying");
    }

    Err(AppError::Conflict(anyhow::anyhow!(
        "Gift card is being used elsewhere. Please try again."
    )))
}

/// Check a code at checkout without drawing from it.
pub async fn validate(
    State(state): State<AppState>,
    OptionalAuth(_user): OptionalAuth,
    Json(payload): Json<ValidateGiftCardRequest>,
) -> Result<Response, AppError> {
    let code = non_empty(payload.code)
        .ok_or_else(|| AppError::bad_request("Gift card code is required"))?;

    let Some(card) = find_by_code(&state, &code).await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "valid": false, "message": "Gift card not found" })),
        )
            .into_response());
    };

    let (valid, status, message) = if card.is_expired() {
        (false, GiftCardStatus::Expired, "Gift card has expired".to_string())
    } else if !card.is_usable() {
        (false, card.status, "Gift card is not usable".to_string())
    } else {
        (
            true,
            card.status,
            format!("Gift card valid with ${:.2} balance", card.current_balance),
        )
    };

    Ok(Json(json!({
        "success": true,
        "valid": valid,
        "data": {
            "code": card.code,
            "balance": card.current_balance,
            "status": status,
            "message": message,
        }
    }))
    .into_response())
}

pub async fn my_cards(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>, AppError> {
    let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
    let cards: Vec<GiftCard> = state
        .db
        .gift_cards()
        .find(doc! { "purchased_by": &user.clerk_id }, options)
        .await?
        .try_collect()
        .await?;

    let data: Vec<GiftCardSummary> = cards.into_iter().map(Into::into).collect();
    Ok(Json(json!({ "success": true, "count": data.len(), "data": data })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn insufficient_balance_reports_available_amount() {
        let mut card = GiftCard::issue(Decimal::from(25));
        card.mark_delivered();
        let err = card.check_redeemable(Decimal::from(40)).unwrap_err();

        let response = redemption_failure(err, &card);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Insufficient balance. Available: $25.00");
        assert_eq!(body["data"]["availableBalance"], 25.0);
        assert_eq!(body["data"]["requestedAmount"], 40.0);
    }

    #[tokio::test]
    async fn undelivered_card_is_not_usable() {
        let card = GiftCard::issue(Decimal::from(25));
        let err = card.check_redeemable(Decimal::from(5)).unwrap_err();

        let body = body_json(redemption_failure(err, &card)).await;
        assert_eq!(body["message"], "This gift card cannot be used");
        assert_eq!(body["data"]["status"], "pending");
    }
}
