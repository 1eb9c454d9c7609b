//! HTTP handlers for storefront-service, one module per resource.

pub mod admin;
pub mod cart;
pub mod email;
pub mod gift_cards;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod uploads;
pub mod users;
pub mod wishlist;

use axum::{http::Uri, response::IntoResponse};
use service_core::error::AppError;

/// Fallback for unmatched routes.
pub async fn not_found(uri: Uri) -> impl IntoResponse {
    AppError::not_found(format!("Route {} not found", uri.path()))
}
