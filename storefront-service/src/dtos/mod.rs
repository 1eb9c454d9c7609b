//! Request and response bodies.
//!
//! Models keep MongoDB's snake_case field names; everything crossing the
//! HTTP boundary is camelCase with hex ids and RFC 3339 timestamps.

pub mod cart;
pub mod catalog;
pub mod gift_card;
pub mod order;
pub mod payment;
pub mod user;

use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::SecondsFormat;
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

pub use cart::*;
pub use catalog::*;
pub use gift_card::*;
pub use order::*;
pub use payment::*;
pub use user::*;

/// Success envelope shared by every resource except the bare product
/// listing.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        Json(self).into_response()
    }
}

/// `201 Created` with the success envelope.
pub fn created<T: Serialize>(body: ApiResponse<T>) -> (StatusCode, ApiResponse<T>) {
    (StatusCode::CREATED, body)
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        Self {
            page,
            limit,
            total,
            pages: if limit == 0 { 0 } else { total.div_ceil(limit) },
        }
    }
}

/// `?page=&limit=`, both 1-based and defaulted per endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl PageQuery {
    pub fn resolve(&self, default_limit: u64) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, 500);
        (page, limit)
    }
}

/// Documents to skip for a 1-based page, capped at what MongoDB accepts
/// as a skip (a signed 64-bit count).
pub fn skip_for(page: u64, limit: u64) -> u64 {
    page.saturating_sub(1)
        .saturating_mul(limit)
        .min(i64::MAX as u64)
}

pub fn iso(at: DateTime) -> String {
    at.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn iso_opt(at: Option<DateTime>) -> Option<String> {
    at.map(iso)
}

pub fn hex_id(id: Option<ObjectId>) -> String {
    id.map(|id| id.to_hex()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_rounds_pages_up() {
        assert_eq!(Pagination::new(1, 20, 0).pages, 0);
        assert_eq!(Pagination::new(1, 20, 20).pages, 1);
        assert_eq!(Pagination::new(2, 20, 41).pages, 3);
    }

    #[test]
    fn page_query_defaults_and_bounds() {
        let query = PageQuery::default();
        assert_eq!(query.resolve(20), (1, 20));

        let query = PageQuery {
            page: Some(0),
            limit: Some(10_000),
        };
        assert_eq!(query.resolve(20), (1, 500));
        assert_eq!(skip_for(3, 20), 40);
    }

    #[test]
    fn huge_page_skip_saturates() {
        assert_eq!(skip_for(u64::MAX, 20), i64::MAX as u64);
        assert_eq!(skip_for(u64::MAX / 2, 500), i64::MAX as u64);
        assert_eq!(skip_for(1, 500), 0);
    }

    #[test]
    fn envelope_omits_empty_fields() {
        let body = serde_json::to_value(ApiResponse::message("Cart cleared")).unwrap();
        assert_eq!(body, serde_json::json!({ "success": true, "message": "Cart cleared" }));

        let body = serde_json::to_value(ApiResponse::ok(3)).unwrap();
        assert_eq!(body, serde_json::json!({ "success": true, "data": 3 }));
    }

    #[test]
    fn iso_uses_millisecond_utc() {
        let at = DateTime::from_millis(1_700_000_000_123);
        assert_eq!(iso(at), "2023-11-14T22:13:20.123Z");
    }
}
