//! Public catalog browsing.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use service_core::error::AppError;

use crate::dtos::{ProductQuery, ProductResponse};
use crate::models::Product;
use crate::services::database::regex_escape;
use crate::AppState;

/// Mongo filter for the shop listing. An empty or `All` category means
/// every category.
pub fn listing_filter(query: &ProductQuery) -> Document {
    let mut filter = Document::new();

    if let Some(keyword) = query.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        filter.insert(
            "name",
            doc! { "$regex": regex_escape(keyword), "$options": "i" },
        );
    }

    if let Some(category) = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty() && *c != "All")
    {
        filter.insert("category", category);
    }

    filter
}

/// List products. Responds with a bare array rather than the envelope.
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    let products: Vec<Product> = state
        .db
        .products()
        .find(listing_filter(&query), None)
        .await?
        .try_collect()
        .await?;

    tracing::debug!(count = products.len(), "Products listed");
    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

/// Fetch one product by slug or id.
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = state
        .db
        .find_product(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    Ok(Json(product.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_category_is_ignored() {
        let query = ProductQuery {
            keyword: None,
            category: Some("All".into()),
        };
        assert!(listing_filter(&query).is_empty());
    }

    #[test]
    fn keyword_is_escaped_and_case_insensitive() {
        let query = ProductQuery {
            keyword: Some(" c++ ".into()),
            category: Some("Coffee".into()),
        };
        let filter = listing_filter(&query);
        let name = filter.get_document("name").unwrap();
        assert_eq!(name.get_str("$regex").unwrap(), "c\\+\\+");
        assert_eq!(name.get_str("$options").unwrap(), "i");
        assert_eq!(filter.get_str("category").unwrap(), "Coffee");
    }
}
