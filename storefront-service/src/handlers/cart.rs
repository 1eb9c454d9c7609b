//! Shopping cart for signed-in shoppers and guest sessions.
//!
//! The caller's cart is found through [`CartIdentity`]: the Clerk user when
//! a bearer token is present, otherwise the `X-Session-Id` header.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use service_core::error::AppError;

use crate::dtos::{
    AddToCartRequest, ApiResponse, CartResponse, MergeCartRequest, PromoRequest,
    UpdateCartItemRequest,
};
use crate::middleware::session::SESSION_HEADER;
use crate::middleware::{CartIdentity, OptionalAuth};
use crate::models::{parse_object_id, Cart, CartOwner, PromoDiscount};
use crate::AppState;

/// Render a cart with its products populated and totals priced.
async fn render(state: &AppState, cart: &Cart) -> Result<CartResponse, AppError> {
    let ids: Vec<_> = cart.items.iter().map(|item| item.product).collect();
    let products = state.db.products_by_ids(&ids).await?;
    Ok(CartResponse::build(cart, &products, &state.policy))
}

async fn existing_cart(state: &AppState, owner: &CartOwner) -> Result<Cart, AppError> {
    state
        .db
        .find_cart(owner)
        .await?
        .ok_or_else(|| AppError::not_found("Cart not found"))
}

pub async fn get_cart(
    State(state): State<AppState>,
    CartIdentity(owner): CartIdentity,
) -> Result<ApiResponse<CartResponse>, AppError> {
    let cart = match &owner {
        Some(owner) => state.db.find_cart(owner).await?,
        None => None,
    };

    let body = match cart {
        Some(cart) => render(&state, &cart).await?,
        None => CartResponse::empty(&state.policy),
    };
    Ok(ApiResponse::ok(body))
}

/// Add a product to the cart, merging with an existing line for the same
/// product and variant.
pub async fn add_to_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
    Json(payload): Json<AddToCartRequest>,
) -> Result<ApiResponse<CartResponse>, AppError> {
    let product_id = payload
        .product_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("Product ID is required"))?;

    let quantity = payload.quantity.unwrap_or(1);
    if quantity < 1 {
        return Err(AppError::bad_request("Quantity must be at least 1"));
    }
    let quantity = u32::try_from(quantity)
        .map_err(|_| AppError::bad_request("Insufficient stock"))?;

    let owner = identity.require()?;

    let product_oid = parse_object_id(product_id, "Product")?;
    let product = state
        .db
        .product_by_id(&product_oid)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    let mut cart = state
        .db
        .find_cart(&owner)
        .await?
        .unwrap_or_else(|| Cart::new(&owner));

    let resulting = cart
        .quantity_after_add(&product_oid, payload.variant.as_deref(), quantity)
        .filter(|&total| product.has_stock_for(total))
        .ok_or_else(|| AppError::bad_request("Insufficient stock"))?;
    cart.add_item(product_oid, quantity, payload.variant, product.effective_price());

    state.db.save_cart(&mut cart).await?;

    tracing::info!(product_id = %product_oid, quantity = resulting, "Item added to cart");
    Ok(ApiResponse::with_message(
        render(&state, &cart).await?,
        "Item added to cart",
    ))
}

/// Change a line's quantity. Zero removes the line.
pub async fn update_cart_item(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(item_id): Path<String>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> Result<ApiResponse<CartResponse>, AppError> {
    if payload.quantity < 0 {
        return Err(AppError::bad_request("Quantity cannot be negative"));
    }
    let quantity = u32::try_from(payload.quantity)
        .map_err(|_| AppError::bad_request("Insufficient stock"))?;

    let owner = identity.require()?;
    let mut cart = existing_cart(&state, &owner).await?;
    let item_oid = parse_object_id(&item_id, "Item")?;

    let product = cart
        .item(&item_oid)
        .map(|item| item.product)
        .ok_or_else(|| AppError::not_found("Item not found"))?;

    if quantity > 0 {
        if let Some(product) = state.db.product_by_id(&product).await? {
            if !product.has_stock_for(quantity) {
                return Err(AppError::bad_request("Insufficient stock"));
            }
        }
    }

    cart.set_quantity(&item_oid, quantity);
    state.db.save_cart(&mut cart).await?;

    Ok(ApiResponse::with_message(
        render(&state, &cart).await?,
        "Cart updated",
    ))
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(item_id): Path<String>,
) -> Result<ApiResponse<CartResponse>, AppError> {
    let owner = identity.require()?;
    let mut cart = existing_cart(&state, &owner).await?;
    let item_oid = parse_object_id(&item_id, "Item")?;

    if !cart.remove_item(&item_oid) {
        return Err(AppError::not_found("Item not found"));
    }
    state.db.save_cart(&mut cart).await?;

    Ok(ApiResponse::with_message(
        render(&state, &cart).await?,
        "Item removed from cart",
    ))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
) -> Result<ApiResponse<CartResponse>, AppError> {
    let owner = identity.require()?;
    let mut cart = existing_cart(&state, &owner).await?;

    cart.clear();
    state.db.save_cart(&mut cart).await?;

    Ok(ApiResponse::with_message(
        render(&state, &cart).await?,
        "Cart cleared",
    ))
}

pub async fn apply_promo(
    State(state): State<AppState>,
    identity: CartIdentity,
    Json(payload): Json<PromoRequest>,
) -> Result<ApiResponse<CartResponse>, AppError> {
    let code = payload
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::bad_request("Promo code is required"))?;

    let owner = identity.require()?;
    let mut cart = existing_cart(&state, &owner).await?;

    let promo = PromoDiscount::lookup(code).ok_or_else(|| {
        tracing::info!(code = %code, "Unknown promo code");
        AppError::bad_request("Invalid promo code")
    })?;
    let message = format!("Promo code {} applied!", promo.code);

    cart.promo_code = Some(promo);
    state.db.save_cart(&mut cart).await?;

    Ok(ApiResponse::with_message(render(&state, &cart).await?, message))
}

pub async fn remove_promo(
    State(state): State<AppState>,
    identity: CartIdentity,
) -> Result<ApiResponse<CartResponse>, AppError> {
    let owner = identity.require()?;
    let mut cart = existing_cart(&state, &owner).await?;

    cart.promo_code = None;
    state.db.save_cart(&mut cart).await?;

    Ok(ApiResponse::with_message(
        render(&state, &cart).await?,
        "Promo code removed",
    ))
}

/// Fold a guest session's cart into the signed-in shopper's cart after
/// login.
pub async fn merge_cart(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    payload: Option<Json<MergeCartRequest>>,
) -> Result<ApiResponse<CartResponse>, AppError> {
    let user = user.ok_or_else(|| AppError::unauthorized("Authentication required"))?;

    let session_id = payload
        .and_then(|Json(body)| body.session_id)
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .filter(|s| !s.trim().is_empty());

    let user_owner = CartOwner::User(user.clerk_id.clone());

    let guest_cart = match session_id {
        Some(session_id) => state.db.find_cart(&CartOwner::Guest(session_id)).await?,
        None => None,
    };

    let Some(mut guest_cart) = guest_cart else {
        let body = match state.db.find_cart(&user_owner).await? {
            Some(cart) => render(&state, &cart).await?,
            None => CartResponse::empty(&state.policy),
        };
        return Ok(ApiResponse::with_message(body, "No guest cart to merge"));
    };

    match state.db.find_cart(&user_owner).await? {
        None => {
            guest_cart.claim(&user.clerk_id);
            state.db.save_cart(&mut guest_cart).await?;
            tracing::info!(clerk_id = %user.clerk_id, "Guest cart transferred");
            Ok(ApiResponse::with_message(
                render(&state, &guest_cart).await?,
                "Cart transferred",
            ))
        }
        Some(mut user_cart) => {
            let guest_owner = guest_cart
                .session_id
                .clone()
                .map(CartOwner::Guest);
            user_cart.merge_from(guest_cart);
            state.db.save_cart(&mut user_cart).await?;
            if let Some(guest_owner) = guest_owner {
                state.db.delete_cart(&guest_owner).await?;
            }
            tracing::info!(clerk_id = %user.clerk_id, lines = user_cart.items.len(), "Guest cart merged");
            Ok(ApiResponse::with_message(
                render(&state, &user_cart).await?,
                "Carts merged successfully",
            ))
        }
    }
}
