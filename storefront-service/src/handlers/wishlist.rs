use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use service_core::error::AppError;

use crate::dtos::{
    created, iso, ApiResponse, ProductSummary, WishlistAddRequest, WishlistItemResponse,
    WishlistResponse,
};
use crate::middleware::RequireAuth;
use crate::models::{parse_object_id, Wishlist};
use crate::AppState;

async fn render(state: &AppState, wishlist: &Wishlist) -> Result<WishlistResponse, AppError> {
    let products = state.db.products_by_ids(&wishlist.product_ids()).await?;
    // Entries whose product was deleted are dropped from the view.
    let items: Vec<WishlistItemResponse> = wishlist
        .products
        .iter()
        .filter_map(|entry| {
            products.get(&entry.product).map(|product| WishlistItemResponse {
                product: ProductSummary::from(product),
                added_at: iso(entry.added_at),
            })
        })
        .collect();

    Ok(WishlistResponse {
        count: items.len(),
        products: items,
    })
}

async fn wishlist_or_new(state: &AppState, clerk_id: &str) -> Result<Wishlist, AppError> {
    Ok(state
        .db
        .wishlist_for(clerk_id)
        .await?
        .unwrap_or_else(|| Wishlist::new(clerk_id)))
}

pub(crate) async fn add_product(
    state: &AppState,
    clerk_id: &str,
    product_id: &str,
) -> Result<(StatusCode, ApiResponse<WishlistResponse>), AppError> {
    let product_oid = parse_object_id(product_id, "Product")?;
    if state.db.product_by_id(&product_oid).await?.is_none() {
        return Err(AppError::not_found("Product not found"));
    }

    let mut wishlist = wishlist_or_new(state, clerk_id).await?;
    if !wishlist.add(product_oid) {
        return Err(AppError::bad_request("Product already in wishlist"));
    }
    state.db.save_wishlist(&mut wishlist).await?;

    tracing::info!(clerk_id = %clerk_id, product_id = %product_oid, "Product added to wishlist");
    Ok(created(ApiResponse::with_message(
        render(state, &wishlist).await?,
        "Product added to wishlist",
    )))
}

pub(crate) async fn remove_product(
    state: &AppState,
    clerk_id: &str,
    product_id: &str,
) -> Result<ApiResponse<WishlistResponse>, AppError> {
    let not_listed = || AppError::not_found("Product not in wishlist");
    let product_oid = parse_object_id(product_id, "Product").map_err(|_| not_listed())?;

    let mut wishlist = state.db.wishlist_for(clerk_id).await?.ok_or_else(not_listed)?;
    if !wishlist.remove(&product_oid) {
        return Err(not_listed());
    }
    state.db.save_wishlist(&mut wishlist).await?;

    Ok(ApiResponse::with_message(
        render(state, &wishlist).await?,
        "Product removed from wishlist",
    ))
}

pub(crate) async fn current(state: &AppState, clerk_id: &str) -> Result<Json<Value>, AppError> {
    let body = match state.db.wishlist_for(clerk_id).await? {
        Some(wishlist) => render(state, &wishlist).await?,
        None => WishlistResponse {
            products: Vec::new(),
            count: 0,
        },
    };
    Ok(Json(json!({ "success": true, "count": body.count, "data": body.products })))
}

pub async fn get_wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>, AppError> {
    current(&state, &user.clerk_id).await
}

pub async fn add_to_wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(payload): Json<WishlistAddRequest>,
) -> Result<(StatusCode, ApiResponse<WishlistResponse>), AppError> {
    let product_id = payload
        .product_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("Product ID is required"))?;

    add_product(&state, &user.clerk_id, product_id).await
}

pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<String>,
) -> Result<ApiResponse<WishlistResponse>, AppError> {
    remove_product(&state, &user.clerk_id, &product_id).await
}

pub async fn clear_wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<ApiResponse<WishlistResponse>, AppError> {
    if let Some(mut wishlist) = state.db.wishlist_for(&user.clerk_id).await? {
        wishlist.products.clear();
        wishlist.updated_at = mongodb::bson::DateTime::now();
        state.db.save_wishlist(&mut wishlist).await?;
    }

    Ok(ApiResponse::with_message(
        WishlistResponse {
            products: Vec::new(),
            count: 0,
        },
        "Wishlist cleared",
    ))
}

pub async fn check_wishlist(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let in_wishlist = match mongodb::bson::oid::ObjectId::parse_str(product_id.trim()) {
        Ok(product) => state
            .db
            .wishlist_for(&user.clerk_id)
            .await?
            .is_some_and(|w| w.contains(&product)),
        Err(_) => false,
    };

    Ok(Json(json!({ "success": true, "inWishlist": in_wishlist })))
}
