//! Order placement, payment hand-off, tracking and fulfilment updates.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime, Document};
use mongodb::options::FindOptions;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{
    created, skip_for, ApiResponse, ConfirmOrderPaymentRequest, CreateOrderRequest,
    IntentCreatedResponse, OrderIntentRequest, OrderListQuery, OrderResponse, Pagination,
    TrackingResponse, UpdateOrderStatusRequest,
};
use crate::middleware::{AdminUser, OptionalAuth, RequireAuth};
use crate::models::{
    parse_object_id, CartOwner, Order, OrderItem, OrderStatus, PaymentStatus, PromoDiscount,
};
use crate::services::metrics::record_order;
use crate::services::pricing::{to_cents, PriceLine};
use crate::services::stripe::CreateIntent;
use crate::AppState;

/// A requested order line before it is priced.
pub struct LineSpec {
    pub product_id: String,
    pub quantity: u32,
    pub variant: Option<String>,
}

/// Price lines from the current catalog. Client-supplied prices are never
/// trusted.
pub async fn reprice(
    state: &AppState,
    lines: Vec<LineSpec>,
) -> Result<(Vec<OrderItem>, Vec<PriceLine>), AppError> {
    let mut items = Vec::new();
    let mut price_lines = Vec::new();

    for line in lines {
        if line.quantity == 0 {
            return Err(AppError::bad_request("Quantity must be at least 1"));
        }
        let product_id = parse_object_id(&line.product_id, "Product")?;
        let product = state
            .db
            .product_by_id(&product_id)
            .await?
            .ok_or_else(|| AppError::not_found("Product not found"))?;

        let price = product.effective_price();
        price_lines.push(PriceLine::new(price, line.quantity));
        items.push(OrderItem::new(
            product_id,
            product.name.clone(),
            product.first_image(),
            price,
            line.quantity,
            line.variant,
        ));
    }

    Ok((items, price_lines))
}

/// Where order emails go: the guest address, else the shopper's profile.
/// A failed profile lookup is logged and treated as no address.
pub async fn notification_address(state: &AppState, order: &Order) -> Option<String> {
    if let Some(email) = order.customer_email() {
        return Some(email.to_string());
    }
    let clerk_id = order.clerk_id.as_deref()?;
    match state.db.user_by_clerk_id(clerk_id).await {
        Ok(user) => user.map(|user| user.email),
        Err(e) => {
            tracing::warn!(error = %e, order_number = %order.order_number, "Customer lookup for order email failed");
            None
        }
    }
}

/// History entries written through the admin status route carry this actor.
pub const ADMIN_ACTOR: &str = "admin";

/// Fold an admin status update into the order.
fn apply_status_update(order: &mut Order, status: OrderStatus, payload: UpdateOrderStatusRequest) {
    if let Some(tracking) = payload.tracking_number {
        order.tracking_number = Some(tracking);
    }
    if let Some(carrier) = payload.carrier {
        order.carrier = Some(carrier);
    }
    if let Some(eta) = payload.estimated_delivery {
        order.estimated_delivery = Some(DateTime::from_chrono(eta));
    }
    order.set_status(status, payload.note, ADMIN_ACTOR);
}

async fn load_order(state: &AppState, id: &str) -> Result<Order, AppError> {
    let id = parse_object_id(id, "Order")?;
    state
        .db
        .order_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))
}

/// Place an order. Signed-in shoppers get their purchase stats updated and
/// their cart emptied.
pub async fn create_order(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, ApiResponse<OrderResponse>), AppError> {
    payload.validate()?;

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

    let promo = payload.discount_code.as_deref().and_then(PromoDiscount::lookup);
    let quote = state.policy.order_quote(
        &lines,
        promo.as_ref(),
        payload.shipping_method,
        payload.gift_wrapping,
    );

    let mut order = Order::new(items, &quote, payload.shipping_address);
    order.clerk_id = user.as_ref().map(|u| u.clerk_id.clone());
    order.guest_email = payload.guest_email.map(|e| e.trim().to_lowercase());
    order.discount_code = promo.map(|p| p.code);
    order.shipping_method = payload.shipping_method;
    order.payment_method = payload.payment_method;
    order.is_gift = payload.is_gift;
    order.gift_message = payload.gift_message;
    order.gift_wrapping = payload.gift_wrapping;
    order.customer_notes = payload.customer_notes;

    state.db.insert_order(&mut order).await?;
    record_order("api", to_cents(order.total));

    if let Some(user) = &user {
        state.db.record_purchase(&user.clerk_id, order.total).await?;
        state.db.delete_cart(&CartOwner::User(user.clerk_id.clone())).await?;
    }

    tracing::info!(
        order_number = %order.order_number,
        total = %order.total,
        guest = user.is_none(),
        "Order created"
    );

    Ok(created(ApiResponse::with_message(
        order.into(),
        "Order created successfully",
    )))
}

/// Create a Stripe payment intent for an order total given in dollars.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Json(payload): Json<OrderIntentRequest>,
) -> Result<ApiResponse<IntentCreatedResponse>, AppError> {
    let amount = payload
        .amount
        .filter(|a| *a > Decimal::ZERO)
        .ok_or_else(|| AppError::bad_request("Valid amount is required"))?;

    let mut order = match payload.order_id.as_deref() {
        Some(id) => Some(load_order(&state, id).await?),
        None => None,
    };

    let mut metadata = Vec::new();
    if let Some(order) = &order {
        metadata.push(("orderId".to_string(), crate::dtos::hex_id(order.id)));
        metadata.push(("orderNumber".to_string(), order.order_number.clone()));
    }
    if let Some(user) = &user {
        metadata.push(("clerkId".to_string(), user.clerk_id.clone()));
    }

    let intent = state
        .stripe
        .create_payment_intent(CreateIntent {
            amount_cents: to_cents(amount),
            currency: state.stripe.currency(),
            no_redirects: false,
            metadata,
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create payment intent");
            AppError::BadGateway(e.to_string())
        })?;

    if let Some(order) = order.as_mut() {
        order.stripe_payment_intent_id = Some(intent.id.clone());
        order.updated_at = DateTime::now();
        state.db.replace_order(order).await?;
    }

    Ok(ApiResponse::ok(IntentCreatedResponse {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
    }))
}

/// Mark an order paid once the client has completed payment.
pub async fn confirm_order_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Option<Json<ConfirmOrderPaymentRequest>>,
) -> Result<ApiResponse<OrderResponse>, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let mut order = load_order(&state, &id).await?;

    order.mark_paid(payload.payment_intent_id, "system");
    state.db.replace_order(&order).await?;

    tracing::info!(order_number = %order.order_number, "Order payment confirmed");
    Ok(ApiResponse::with_message(order.into(), "Payment confirmed"))
}

pub async fn my_orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>, AppError> {
    let orders = state.db.orders_for(&user.clerk_id, None).await?;
    let data: Vec<OrderResponse> = orders.into_iter().map(Into::into).collect();
    Ok(Json(json!({ "success": true, "count": data.len(), "data": data })))
}

/// Public tracking by order number.
pub async fn track_order(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<ApiResponse<TrackingResponse>, AppError> {
    let order = state
        .db
        .orders()
        .find_one(doc! { "order_number": order_number.trim() }, None)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    Ok(ApiResponse::ok(order.into()))
}

/// Fetch one order. Orders owned by another shopper are refused.
pub async fn get_order(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<String>,
) -> Result<ApiResponse<OrderResponse>, AppError> {
    let order = load_order(&state, &id).await?;

    if let Some(owner) = order.clerk_id.as_deref() {
        let allowed = user
            .as_ref()
            .is_some_and(|u| u.clerk_id == owner || state.config.auth.is_admin(&u.clerk_id));
        if !allowed {
            return Err(AppError::forbidden("Not authorized"));
        }
    }

    Ok(ApiResponse::ok(order.into()))
}

pub fn order_filter(query: &OrderListQuery) -> Result<Document, AppError> {
    let mut filter = Document::new();
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty() && *s != "all") {
        let status = OrderStatus::parse(status)
            .ok_or_else(|| AppError::bad_request(format!("Invalid status: {}", status)))?;
        filter.insert("status", status.as_str());
    }
    if let Some(payment) = query
        .payment_status
        .as_deref()
        .filter(|s| !s.is_empty() && *s != "all")
    {
        let payment = PaymentStatus::parse(payment)
            .ok_or_else(|| AppError::bad_request(format!("Invalid payment status: {}", payment)))?;
        filter.insert("payment_status", payment.as_str());
    }
    Ok(filter)
}

/// All orders, newest first, filtered and paginated.
pub async fn list_orders(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Value>, AppError> {
    let filter = order_filter(&query)?;
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 500);

    let total = state.db.orders().count_documents(filter.clone(), None).await?;
    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .skip(skip_for(page, limit))
        .limit(limit as i64)
        .build();
    let orders: Vec<Order> = state
        .db
        .orders()
        .find(filter, options)
        .await?
        .try_collect()
        .await?;

    let data: Vec<OrderResponse> = orders.into_iter().map(Into::into).collect();
    Ok(Json(json!({
        "success": true,
        "data": data,
        "pagination": Pagination::new(page, limit, total),
    })))
}

/// Move an order through fulfilment. Shipping and delivery notify the
/// customer by email when an address is known.
pub async fn update_order_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<ApiResponse<OrderResponse>, AppError> {
    let status = OrderStatus::parse(payload.status.trim())
        .ok_or_else(|| AppError::bad_request("Invalid status"))?;
    let mut order = load_order(&state, &id).await?;

    apply_status_update(&mut order, status, payload);
    state.db.replace_order(&order).await?;

    tracing::info!(
        order_number = %order.order_number,
        status = status.as_str(),
        admin_id = %admin.clerk_id,
        "Order status updated"
    );

    if matches!(status, OrderStatus::Shipped | OrderStatus::Delivered) {
        if let Some(to) = notification_address(&state, &order).await {
            let sent = match status {
                OrderStatus::Shipped => state.email.send_shipping_notification(&order, &to).await,
                _ => state.email.send_delivery_notification(&order, &to).await,
            };
            if let Err(e) = sent {
                tracing::warn!(error = %e, order_number = %order.order_number, "Status email not sent");
            }
        }
    }

    Ok(ApiResponse::with_message(order.into(), "Order status updated"))
}
