//! Back-office endpoints: dashboard, customers, catalog and inventory.
//!
//! Every handler takes [`AdminUser`], so non-admins get 403 before any
//! query runs. Order management reuses the order handlers directly.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use futures::TryStreamExt;
use mongodb::bson::{doc, DateTime, Document};
use mongodb::options::FindOptions;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{
    created, skip_for, ApiResponse, OrderResponse, PageQuery, Pagination, ProductInput,
    ProductResponse, ProductUpdate, UserResponse,
};
use crate::middleware::AdminUser;
use crate::models::{parse_object_id, Order, PaymentStatus, Product, ProductStatus, User};
use crate::services::analytics::{self as figures, Dashboard};
use crate::services::database::{is_duplicate_key, regex_escape};
use crate::services::pricing::round2;
use crate::AppState;

pub use super::orders::{list_orders, update_order_status};

/// Stock at or below this is "low".
pub const LOW_STOCK_THRESHOLD: i64 = 10;
const LOW_STOCK_ALERTS: usize = 10;
const CUSTOMER_RECENT_ORDERS: i64 = 10;

pub async fn analytics(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<ApiResponse<Dashboard>, AppError> {
    let now = chrono::Utc::now();
    let (this_month, _) = figures::month_bounds(now);

    let orders: Vec<Order> = state
        .db
        .orders()
        .find(doc! {}, None)
        .await?
        .try_collect()
        .await?;
    let new_customers = state
        .db
        .users()
        .count_documents(
            doc! { "created_at": { "$gte": DateTime::from_chrono(this_month) } },
            None,
        )
        .await?;

    Ok(ApiResponse::ok(figures::dashboard(&orders, new_customers, now)))
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStats {
    pub total_orders: u64,
    pub total_spent: Decimal,
    pub avg_order_value: Decimal,
}

impl CustomerStats {
    /// Order count covers every order; spend only counts paid ones.
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut stats = CustomerStats::default();
        let mut paid = 0u64;
        for order in orders {
            stats.total_orders += 1;
            if order.payment_status == PaymentStatus::Paid {
                paid += 1;
                stats.total_spent += order.total;
            }
        }
        stats.total_spent = round2(stats.total_spent);
        if paid > 0 {
            stats.avg_order_value = round2(stats.total_spent / Decimal::from(paid));
        }
        stats
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRow {
    #[serde(flatten)]
    pub user: UserResponse,
    pub order_stats: CustomerStats,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

pub fn customer_filter(search: Option<&str>) -> Document {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => {
            let pattern = doc! { "$regex": regex_escape(term), "$options": "i" };
            doc! {
                "$or": [
                    { "email": pattern.clone() },
                    { "first_name": pattern.clone() },
                    { "last_name": pattern },
                ]
            }
        }
        None => Document::new(),
    }
}

pub async fn customers(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Value>, AppError> {
    let (page, limit) = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .resolve(20);
    let filter = customer_filter(query.search.as_deref());

    let total = state.db.users().count_documents(filter.clone(), None).await?;
    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .skip(skip_for(page, limit))
        .limit(limit as i64)
        .build();
    let users: Vec<User> = state
        .db
        .users()
        .find(filter, options)
        .await?
        .try_collect()
        .await?;

    let clerk_ids: Vec<&str> = users.iter().map(|u| u.clerk_id.as_str()).collect();
    let orders: Vec<Order> = state
        .db
        .orders()
        .find(doc! { "clerk_id": { "$in": clerk_ids } }, None)
        .await?
        .try_collect()
        .await?;

    let mut by_customer: HashMap<&str, Vec<&Order>> = HashMap::new();
    for order in &orders {
        if let Some(clerk_id) = order.clerk_id.as_deref() {
            by_customer.entry(clerk_id).or_default().push(order);
        }
    }

    let data: Vec<CustomerRow> = users
        .into_iter()
        .map(|user| {
            let order_stats = by_customer
                .get(user.clerk_id.as_str())
                .map(|orders| CustomerStats::from_orders(orders.iter().copied()))
                .unwrap_or_default();
            CustomerRow {
                user: user.into(),
                order_stats,
            }
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": data,
        "pagination": Pagination::new(page, limit, total),
    })))
}

pub async fn customer_detail(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<Value>, AppError> {
    let not_found = || AppError::not_found("Customer not found");
    let id = parse_object_id(&id, "Customer")?;
    let user = state
        .db
        .users()
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(not_found)?;

    let all_orders = state.db.orders_for(&user.clerk_id, None).await?;
    let stats = CustomerStats::from_orders(&all_orders);
    let recent: Vec<OrderResponse> = all_orders
        .into_iter()
        .take(CUSTOMER_RECENT_ORDERS as usize)
        .map(Into::into)
        .collect();

    Ok(ApiResponse::ok(json!({
        "customer": UserResponse::from(user),
        "orders": recent,
        "stats": stats,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminProductQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

pub fn admin_product_filter(query: &AdminProductQuery) -> Result<Document, AppError> {
    let mut filter = Document::new();
    if let Some(status) = query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "all")
    {
        let status = ProductStatus::parse(status)
            .ok_or_else(|| AppError::bad_request(format!("Invalid status: {}", status)))?;
        filter.insert("status", status.as_str());
    }
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = doc! { "$regex": regex_escape(term), "$options": "i" };
        filter.insert(
            "$or",
            vec![
                doc! { "name": pattern.clone() },
                doc! { "artisan": pattern.clone() },
                doc! { "sku": pattern },
            ],
        );
    }
    Ok(filter)
}

pub async fn list_products(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<AdminProductQuery>,
) -> Result<Json<Value>, AppError> {
    let filter = admin_product_filter(&query)?;
    let (page, limit) = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .resolve(500);

    let total = state.db.products().count_documents(filter.clone(), None).await?;
    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .skip(skip_for(page, limit))
        .limit(limit as i64)
        .build();
    let products: Vec<Product> = state
        .db
        .products()
        .find(filter, options)
        .await?
        .try_collect()
        .await?;

    let data: Vec<ProductResponse> = products.into_iter().map(Into::into).collect();
    Ok(Json(json!({
        "success": true,
        "data": data,
        "pagination": Pagination::new(page, limit, total),
    })))
}

fn slug_taken(e: mongodb::error::Error) -> AppError {
    if is_duplicate_key(&e) {
        AppError::Conflict(anyhow::anyhow!("A product with this slug already exists"))
    } else {
        e.into()
    }
}

pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<ProductInput>,
) -> Result<(StatusCode, ApiResponse<ProductResponse>), AppError> {
    payload.validate()?;

    let mut product = payload.into_product();
    let result = state
        .db
        .products()
        .insert_one(&product, None)
        .await
        .map_err(slug_taken)?;
    product.id = result.inserted_id.as_object_id();

    tracing::info!(slug = %product.slug, created_by = %admin.clerk_id, "Product created");
    Ok(created(ApiResponse::with_message(
        product.into(),
        "Product created successfully",
    )))
}

pub async fn update_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(payload): Json<ProductUpdate>,
) -> Result<ApiResponse<ProductResponse>, AppError> {
    payload.validate()?;
    let id = parse_object_id(&id, "Product")?;
    let mut product = state
        .db
        .product_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    payload.apply(&mut product);
    product.updated_at = DateTime::now();
    state
        .db
        .products()
        .replace_one(doc! { "_id": id }, &product, None)
        .await
        .map_err(slug_taken)?;

    tracing::info!(product_id = %id, updated_by = %admin.clerk_id, "Product updated");
    Ok(ApiResponse::with_message(
        product.into(),
        "Product updated successfully",
    ))
}

pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    let id = parse_object_id(&id, "Product")?;
    let result = state
        .db
        .products()
        .delete_one(doc! { "_id": id }, None)
        .await?;
    if result.deleted_count == 0 {
        return Err(AppError::not_found("Product not found"));
    }

    tracing::info!(product_id = %id, deleted_by = %admin.clerk_id, "Product deleted");
    Ok(ApiResponse::message("Product deleted successfully"))
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    pub total_products: usize,
    pub in_stock: usize,
    pub low_stock: usize,
    pub out_of_stock: usize,
}

impl InventoryStats {
    pub fn tally(products: &[Product]) -> Self {
        let mut stats = InventoryStats {
            total_products: products.len(),
            ..Default::default()
        };
        for product in products {
            match product.stock {
                s if s <= 0 => stats.out_of_stock += 1,
                s if s <= LOW_STOCK_THRESHOLD => stats.low_stock += 1,
                _ => stats.in_stock += 1,
            }
        }
        stats
    }
}

pub async fn inventory(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> Result<ApiResponse<Value>, AppError> {
    let options = FindOptions::builder().sort(doc! { "stock": 1 }).build();
    let products: Vec<Product> = state
        .db
        .products()
        .find(doc! {}, options)
        .await?
        .try_collect()
        .await?;

    let stats = InventoryStats::tally(&products);
    let alerts: Vec<ProductResponse> = products
        .iter()
        .filter(|p| p.stock <= LOW_STOCK_THRESHOLD)
        .take(LOW_STOCK_ALERTS)
        .cloned()
        .map(Into::into)
        .collect();
    let products: Vec<ProductResponse> = products.into_iter().map(Into::into).collect();

    Ok(ApiResponse::ok(json!({
        "stats": stats,
        "lowStockAlerts": alerts,
        "products": products,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64) -> Product {
        let input: ProductInput = serde_json::from_value(json!({
            "name": "Dark Roast",
            "description": "Small batch",
            "price": 40.0,
            "category": "Coffee",
            "artisan": "Ada",
            "stock": stock,
        }))
        .unwrap();
        input.into_product()
    }

    #[test]
    fn inventory_buckets_by_threshold() {
        let products = vec![product(0), product(3), product(10), product(11), product(50)];
        let stats = InventoryStats::tally(&products);
        assert_eq!(
            stats,
            InventoryStats {
                total_products: 5,
                in_stock: 2,
                low_stock: 2,
                out_of_stock: 1,
            }
        );
    }

    #[test]
    fn customer_search_is_case_insensitive_over_three_fields() {
        let filter = customer_filter(Some(" Ada "));
        let clauses = filter.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 3);
        let email = clauses[0].as_document().unwrap().get_document("email").unwrap();
        assert_eq!(email.get_str("$regex").unwrap(), "Ada");
        assert_eq!(email.get_str("$options").unwrap(), "i");

        assert!(customer_filter(Some("  ")).is_empty());
        assert!(customer_filter(None).is_empty());
    }

    #[test]
    fn admin_product_filter_rejects_unknown_status() {
        let query = AdminProductQuery {
            status: Some("bogus".into()),
            ..Default::default()
        };
        assert!(admin_product_filter(&query).is_err());

        let query = AdminProductQuery {
            status: Some("all".into()),
            search: Some("bowl".into()),
            ..Default::default()
        };
        let filter = admin_product_filter(&query).unwrap();
        assert!(filter.get("status").is_none());
        assert_eq!(filter.get_array("$or").unwrap().len(), 3);
    }
}
