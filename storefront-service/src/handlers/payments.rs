//! Stripe checkout flow.
//!
//! The storefront creates a payment intent up front, the browser confirms
//! it with Stripe, and `/confirm` then turns the paid intent into an order.
//! Webhooks keep order payment state in step when the browser never comes
//! back.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use service_core::error::AppError;

use super::orders::{reprice, LineSpec};
use crate::dtos::{
    created, ApiResponse, CheckoutRequest, CheckoutResponse, ConfirmPaymentRequest,
    CreateIntentRequest, IntentCreatedResponse, IntentDetails, OrderResponse, RefundRequest,
    RefundResponse,
};
use crate::middleware::{AdminUser, CartIdentity};
use crate::models::{Order, PaymentStatus, ShippingMethod};
use crate::services::database::is_duplicate_key_error;
use crate::services::metrics::record_order;
use crate::services::pricing::{to_cents, PriceLine};
use crate::services::stripe::CreateIntent;
use crate::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn upstream(e: anyhow::Error) -> AppError {
    tracing::error!(error = %e, "Stripe request failed");
    AppError::BadGateway(e.to_string())
}

pub async fn create_intent(
    State(state): State<AppState>,
    Json(payload): Json<CreateIntentRequest>,
) -> Result<ApiResponse<IntentCreatedResponse>, AppError> {
    let amount = payload
        .amount
        .filter(|a| *a > Decimal::ZERO)
        .ok_or_else(|| AppError::bad_request("Invalid amount"))?;

    let currency = payload
        .currency
        .unwrap_or_else(|| state.stripe.currency().to_string());

    let intent = state
        .stripe
        .create_payment_intent(CreateIntent {
            amount_cents: to_cents(amount),
            currency: &currency,
            no_redirects: false,
            metadata: payload.metadata.into_iter().collect(),
        })
        .await
        .map_err(upstream)?;

    Ok(ApiResponse::ok(IntentCreatedResponse {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
    }))
}

/// Price a cart for the checkout page and open a payment intent for the
/// total when Stripe is configured.
pub async fn checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<ApiResponse<CheckoutResponse>, AppError> {
    if payload.cart_items.is_empty() {
        return Err(AppError::bad_request("Cart is empty"));
    }
    if payload.shipping_address.as_ref().map_or(true, Value::is_null) {
        return Err(AppError::bad_request("Shipping address is required"));
    }

    let lines: Vec<PriceLine> = payload
        .cart_items
        .iter()
        .map(|line| PriceLine::new(line.price, line.quantity))
        .collect();
    let quote = state
        .policy
        .order_quote(&lines, None, ShippingMethod::Standard, false);

    let (client_secret, payment_intent_id) = if state.stripe.is_configured() {
        let intent = state
            .stripe
            .create_payment_intent(CreateIntent {
                amount_cents: to_cents(quote.total),
                currency: state.stripe.currency(),
                no_redirects: true,
                metadata: vec![("source".to_string(), "checkout".to_string())],
            })
            .await
            .map_err(upstream)?;
        (intent.client_secret, Some(intent.id))
    } else {
        tracing::warn!("Stripe not configured; checkout summary returned without a payment intent");
        (None, None)
    };

    Ok(ApiResponse::ok(CheckoutResponse {
        client_secret,
        payment_intent_id,
        amount: quote.total,
        subtotal: quote.subtotal,
        tax: quote.tax,
        shipping: quote.shipping,
        total: quote.total,
    }))
}

fn order_created_body(order: Order) -> Value {
    let order_number = order.order_number.clone();
    json!({ "order": OrderResponse::from(order), "orderNumber": order_number })
}

/// Turn a paid payment intent into an order.
///
/// Repeating the call for the same intent returns the order created the
/// first time.
pub async fn confirm_payment(
    State(state): State<AppState>,
    CartIdentity(owner): CartIdentity,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> Result<(StatusCode, ApiResponse<Value>), AppError> {
    let intent_id = payload
        .payment_intent_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("Payment intent ID is required"))?
        .to_string();

    if let Some(existing) = state.db.order_by_payment_intent(&intent_id).await? {
        tracing::info!(payment_intent_id = %intent_id, order_number = %existing.order_number, "Order already exists for payment intent");
        return Ok((
            StatusCode::OK,
            ApiResponse::with_message(order_created_body(existing), "Order already exists"),
        ));
    }

    let intent = state
        .stripe
        .retrieve_payment_intent(&intent_id)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, payment_intent_id = %intent_id, "Could not retrieve payment intent");
            AppError::bad_request("Invalid payment intent")
        })?;

    let enforce_status = state.config.environment.is_production() && !state.stripe.is_test_mode();
    if enforce_status && intent.status != "succeeded" {
        return Err(AppError::bad_request(format!(
            "Payment not completed. Status: {}",
            intent.status
        )));
    }

    if payload.items.is_empty() {
        return Err(AppError::bad_request("No order items"));
    }

    let specs: Vec<LineSpec> = payload
        .items
        .iter()
        .map(|line| LineSpec {
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            variant: line.variant.clone(),
        })
        .collect();
    let (items, lines) = reprice(&state, specs).await?;
    let quote = state
        .policy
        .order_quote(&lines, None, ShippingMethod::Standard, false);

    let clerk_id = owner
        .as_ref()
        .and_then(|o| o.clerk_id())
        .map(str::to_string);

    let user_email = match clerk_id.as_deref() {
        Some(clerk_id) => state.db.user_by_clerk_id(clerk_id).await?.map(|u| u.email),
        None => None,
    };
    let email = payload
        .shipping_address
        .email
        .clone()
        .or(payload.email)
        .filter(|e| !e.trim().is_empty())
        .map(|e| e.trim().to_lowercase())
        .or(user_email);
    let first_name = payload
        .shipping_address
        .greeting_name()
        .unwrap_or_else(|| "there".to_string());

    let mut order = Order::new(items, &quote, payload.shipping_address.into_shipping_address());
    order.clerk_id = clerk_id.clone();
    order.guest_email = email.clone();
    order.mark_paid(Some(intent_id.clone()), "system");

    if let Err(e) = state.db.insert_order(&mut order).await {
        if !is_duplicate_key_error(&e) {
            return Err(e);
        }
        // A concurrent confirm for the same intent won the insert.
        let existing = state
            .db
            .order_by_payment_intent(&intent_id)
            .await?
            .ok_or(e)?;
        tracing::info!(payment_intent_id = %intent_id, order_number = %existing.order_number, "Order already exists for payment intent");
        return Ok((
            StatusCode::OK,
            ApiResponse::with_message(order_created_body(existing), "Order already exists"),
        ));
    }
    record_order("stripe", to_cents(order.total));

    if let Some(owner) = &owner {
        state.db.delete_cart(owner).await?;
    }
    if let Some(clerk_id) = &clerk_id {
        state.db.record_purchase(clerk_id, order.total).await?;
    }

    match &email {
        Some(to) => {
            if let Err(e) = state.email.send_order_confirmation(&order, to, &first_name).await {
                tracing::warn!(error = %e, order_number = %order.order_number, "Order confirmation email not sent");
            }
        }
        None => tracing::warn!(order_number = %order.order_number, "No email address for order confirmation"),
    }

    tracing::info!(
        order_number = %order.order_number,
        payment_intent_id = %intent_id,
        total = %order.total,
        "Order created from payment"
    );

    Ok(created(ApiResponse::with_message(
        order_created_body(order),
        "Order created successfully",
    )))
}

pub async fn get_intent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<ApiResponse<IntentDetails>, AppError> {
    let intent = state
        .stripe
        .retrieve_payment_intent(&id)
        .await
        .map_err(upstream)?;

    Ok(ApiResponse::ok(IntentDetails {
        id: intent.id,
        amount: from_cents(intent.amount),
        currency: intent.currency,
        status: intent.status,
        created: intent.created,
    }))
}

/// Refund a payment, in full or in part, and mirror it onto the order.
pub async fn refund(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<RefundRequest>,
) -> Result<ApiResponse<RefundResponse>, AppError> {
    let intent_id = payload
        .payment_intent_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("Payment intent ID is required"))?;

    if let Some(amount) = payload.amount {
        if amount <= Decimal::ZERO {
            return Err(AppError::bad_request("Invalid amount"));
        }
    }

    let reason = payload
        .reason
        .as_deref()
        .unwrap_or("requested_by_customer");
    let refund = state
        .stripe
        .create_refund(intent_id, payload.amount.map(to_cents), reason)
        .await
        .map_err(upstream)?;
    let refunded = from_cents(refund.amount);

    if let Some(mut order) = state.db.order_by_payment_intent(intent_id).await? {
        order.apply_refund(refunded);
        state.db.replace_order(&order).await?;
        tracing::info!(
            order_number = %order.order_number,
            payment_status = order.payment_status.as_str(),
            refunded_by = %admin.clerk_id,
            "Order refunded"
        );
    }

    Ok(ApiResponse::with_message(
        RefundResponse {
            refund_id: refund.id,
            amount: refunded,
            status: refund.status,
        },
        "Refund processed successfully",
    ))
}

/// Stripe webhook receiver. The body is verified against the
/// `Stripe-Signature` header before anything is trusted.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::bad_request("Missing stripe-signature header"))?;

    let event = state
        .stripe
        .construct_event(&body, signature, chrono::Utc::now().timestamp())
        .map_err(|e| {
            tracing::warn!(error = %e, "Rejected Stripe webhook");
            AppError::bad_request(format!("Webhook Error: {}", e))
        })?;

    tracing::info!(event_id = %event.id, event_type = %event.event_type, "Stripe webhook received");

    match event.event_type.as_str() {
        "payment_intent.succeeded" | "payment_intent.payment_failed" => {
            let Some(intent_id) = event.object_id() else {
                return Ok(Json(json!({ "received": true })));
            };
            match state.db.order_by_payment_intent(intent_id).await? {
                Some(mut order) => {
                    if event.event_type == "payment_intent.succeeded" {
                        if order.payment_status != PaymentStatus::Paid {
                            order.mark_paid(None, "stripe");
                            state.db.replace_order(&order).await?;
                        }
                    } else {
                        order.payment_status = PaymentStatus::Failed;
                        order.updated_at = mongodb::bson::DateTime::now();
                        state.db.replace_order(&order).await?;
                    }
                    tracing::info!(
                        order_number = %order.order_number,
                        payment_status = order.payment_status.as_str(),
                        "Order payment state updated from webhook"
                    );
                }
                None => {
                    tracing::info!(payment_intent_id = %intent_id, "No order for payment intent yet")
                }
            }
        }
        other => tracing::debug!(event_type = %other, "Unhandled Stripe event"),
    }

    Ok(Json(json!({ "received": true })))
}
