//! Shopper profiles mirrored from Clerk.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use mongodb::bson::{doc, DateTime};
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use service_core::error::AppError;
use validator::Validate;

use super::wishlist;
use crate::dtos::{
    address_list, created, AddressRequest, AddressResponse, ApiResponse, ClerkUserData,
    ClerkWebhookEvent, UpdateProfileRequest, UserResponse, WishlistResponse,
};
use crate::middleware::{svix, RequireAuth};
use crate::models::{parse_object_id, User};
use crate::services::database::is_duplicate_key_error;
use crate::AppState;

/// Create or refresh the local copy of a Clerk user. Returns the stored
/// user and whether it was newly created.
pub async fn upsert_from_clerk(state: &AppState, data: &ClerkUserData) -> Result<(User, bool), AppError> {
    if data.id.trim().is_empty() {
        return Err(AppError::bad_request("User ID is required"));
    }

    let (mut user, is_new) = match state.db.user_by_clerk_id(&data.id).await? {
        Some(user) => (user, false),
        None => {
            let email = data
                .primary_email()
                .ok_or_else(|| AppError::bad_request("Email is required"))?;
            (User::new(&data.id, email), true)
        }
    };

    data.apply(&mut user);
    user.last_login_at = Some(DateTime::now());

    state.db.save_user(&mut user).await.map_err(|e| {
        if is_duplicate_key_error(&e) {
            AppError::Conflict(anyhow::anyhow!("A user with this email already exists"))
        } else {
            e
        }
    })?;

    tracing::info!(clerk_id = %user.clerk_id, created = is_new, "User synced from Clerk");
    Ok((user, is_new))
}

/// Clerk user lifecycle webhook, verified with Svix signatures.
pub async fn clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let secret = state.config.auth.clerk_webhook_secret.expose_secret();
    if secret.is_empty() {
        tracing::warn!("Clerk webhook secret not configured; skipping signature verification");
    } else {
        svix::verify(&headers, &body, secret, chrono::Utc::now().timestamp())?;
    }

    let event: ClerkWebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("Invalid webhook payload: {}", e)))?;

    tracing::info!(event_type = %event.event_type, "Clerk webhook received");

    match event.event_type.as_str() {
        "user.created" | "user.updated" => {
            let data: ClerkUserData = serde_json::from_value(event.data)
                .map_err(|e| AppError::bad_request(format!("Invalid user payload: {}", e)))?;
            let (user, is_new) = upsert_from_clerk(&state, &data).await?;

            if is_new && event.event_type == "user.created" {
                let first_name = if user.first_name.is_empty() {
                    "there"
                } else {
                    user.first_name.as_str()
                };
                if let Err(e) = state.email.send_welcome(&user.email, first_name).await {
                    tracing::warn!(error = %e, clerk_id = %user.clerk_id, "Welcome email not sent");
                }
            }
        }
        "user.deleted" => {
            if let Some(clerk_id) = event.data.get("id").and_then(Value::as_str) {
                let result = state
                    .db
                    .users()
                    .delete_one(doc! { "clerk_id": clerk_id }, None)
                    .await?;
                tracing::info!(clerk_id = %clerk_id, deleted = result.deleted_count, "User removed");
            }
        }
        other => tracing::debug!(event_type = %other, "Ignoring Clerk event"),
    }

    Ok(Json(json!({ "success": true, "message": "Webhook processed" })))
}

/// Client-driven sync after sign-in, for setups without webhooks.
pub async fn sync_user(
    State(state): State<AppState>,
    Json(data): Json<ClerkUserData>,
) -> Result<ApiResponse<UserResponse>, AppError> {
    let (user, _) = upsert_from_clerk(&state, &data).await?;
    Ok(ApiResponse::with_message(user.into(), "User synced"))
}

async fn current_user(state: &AppState, clerk_id: &str) -> Result<User, AppError> {
    state
        .db
        .user_by_clerk_id(clerk_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

pub async fn get_me(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
) -> Result<ApiResponse<UserResponse>, AppError> {
    let user = current_user(&state, &auth.clerk_id).await?;
    Ok(ApiResponse::ok(user.into()))
}

pub async fn update_me(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<ApiResponse<UserResponse>, AppError> {
    payload.validate()?;

    let mut user = current_user(&state, &auth.clerk_id).await?;
    payload.apply(&mut user);
    state.db.save_user(&mut user).await?;

    Ok(ApiResponse::with_message(user.into(), "Profile updated"))
}

pub async fn add_address(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Json(payload): Json<AddressRequest>,
) -> Result<(StatusCode, ApiResponse<Vec<AddressResponse>>), AppError> {
    payload.validate()?;

    let mut user = current_user(&state, &auth.clerk_id).await?;
    user.add_address(payload.into());
    state.db.save_user(&mut user).await?;

    Ok(created(ApiResponse::with_message(
        address_list(user.addresses),
        "Address added",
    )))
}

pub async fn remove_address(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Path(address_id): Path<String>,
) -> Result<ApiResponse<Vec<AddressResponse>>, AppError> {
    let address_id = parse_object_id(&address_id, "Address")?;

    let mut user = current_user(&state, &auth.clerk_id).await?;
    if !user.remove_address(&address_id) {
        return Err(AppError::not_found("Address not found"));
    }
    state.db.save_user(&mut user).await?;

    Ok(ApiResponse::with_message(
        address_list(user.addresses),
        "Address removed",
    ))
}

pub async fn my_wishlist(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
) -> Result<Json<Value>, AppError> {
    wishlist::current(&state, &auth.clerk_id).await
}

pub async fn add_to_my_wishlist(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Path(product_id): Path<String>,
) -> Result<(StatusCode, ApiResponse<WishlistResponse>), AppError> {
    wishlist::add_product(&state, &auth.clerk_id, &product_id).await
}

pub async fn remove_from_my_wishlist(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    Path(product_id): Path<String>,
) -> Result<ApiResponse<WishlistResponse>, AppError> {
    wishlist::remove_product(&state, &auth.clerk_id, &product_id).await
}
