use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

use super::{hex_id, iso};
use crate::models::product::{is_known_category, slugify};
use crate::models::{
    NutritionalInfo, Product, ProductStatus, RatingDistribution, RatingSummary, Review,
    ReviewStatus,
};

// ==================== Products ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub sku: Option<String>,
    pub images: Vec<String>,
    pub category: String,
    pub stock: i64,
    pub rating: f64,
    pub review_count: u32,
    pub rating_distribution: RatingDistribution,
    pub featured: bool,
    pub status: ProductStatus,
    pub artisan: String,
    pub dietary: Vec<String>,
    pub origin: String,
    pub nutritional_info: NutritionalInfo,
    pub ingredients: String,
    pub variants: BTreeMap<String, serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: hex_id(p.id),
            name: p.name,
            slug: p.slug,
            description: p.description,
            price: p.price,
            compare_at_price: p.compare_at_price,
            sale_price: p.sale_price,
            sku: p.sku,
            images: p.images,
            category: p.category,
            stock: p.stock,
            rating: p.rating,
            review_count: p.review_count,
            rating_distribution: p.rating_distribution,
            featured: p.featured,
            status: p.status,
            artisan: p.artisan,
            dietary: p.dietary,
            origin: p.origin,
            nutritional_info: p.nutritional_info,
            ingredients: p.ingredients,
            variants: p.variants,
            created_at: iso(p.created_at),
            updated_at: iso(p.updated_at),
        }
    }
}

/// The product fields carts, wishlists and reviews show alongside a line.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub sale_price: Option<Decimal>,
    pub images: Vec<String>,
    pub stock: i64,
    pub status: ProductStatus,
}

impl From<&Product> for ProductSummary {
    fn from(p: &Product) -> Self {
        Self {
            id: hex_id(p.id),
            name: p.name.clone(),
            slug: p.slug.clone(),
            price: p.price,
            sale_price: p.sale_price,
            images: p.images.clone(),
            stock: p.stock,
            status: p.status,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub keyword: Option<String>,
    pub category: Option<String>,
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}

fn known_category(value: &str) -> Result<(), ValidationError> {
    if is_known_category(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("category");
        err.message = Some(format!("{} is not a valid category", value).into());
        Err(err)
    }
}

fn known_status(value: &str) -> Result<(), ValidationError> {
    match ProductStatus::parse(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("status")),
    }
}

/// Admin product create payload; also the shape of seed files.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    #[validate(length(min = 1, max = 100, message = "Product name is required (max 100 characters)"))]
    pub name: String,
    pub slug: Option<String>,
    #[validate(length(min = 1, max = 2000, message = "Description is required (max 2000 characters)"))]
    pub description: String,
    #[validate(custom(function = "non_negative"))]
    pub price: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub compare_at_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub sale_price: Option<Decimal>,
    pub sku: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[validate(custom(function = "known_category"))]
    pub category: String,
    #[serde(default)]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i64,
    #[serde(default)]
    pub featured: bool,
    #[validate(custom(function = "known_status"))]
    pub status: Option<String>,
    #[validate(length(min = 1, message = "Artisan is required"))]
    pub artisan: String,
    #[serde(default)]
    pub dietary: Vec<String>,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub nutritional_info: NutritionalInfo,
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub variants: BTreeMap<String, serde_json::Value>,
}

impl ProductInput {
    pub fn into_product(self) -> Product {
        let now = mongodb::bson::DateTime::now();
        let slug = match self.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => slugify(&self.name),
        };
        Product {
            id: None,
            name: self.name.trim().to_string(),
            slug,
            description: self.description,
            price: self.price,
            compare_at_price: self.compare_at_price,
            sale_price: self.sale_price,
            sku: self.sku,
            images: self.images,
            category: self.category,
            stock: self.stock,
            rating: 0.0,
            review_count: 0,
            rating_distribution: RatingDistribution::default(),
            featured: self.featured,
            status: self
                .status
                .as_deref()
                .and_then(ProductStatus::parse)
                .unwrap_or_default(),
            artisan: self.artisan,
            dietary: self.dietary,
            origin: self.origin,
            nutritional_info: self.nutritional_info,
            ingredients: self.ingredients,
            variants: self.variants,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial product update; absent fields are left alone.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub slug: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub description: Option<String>,
    #[validate(custom(function = "non_negative"))]
    pub price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub compare_at_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub sale_price: Option<Decimal>,
    pub sku: Option<String>,
    pub images: Option<Vec<String>>,
    #[validate(custom(function = "known_category"))]
    pub category: Option<String>,
    #[validate(range(min = 0))]
    pub stock: Option<i64>,
    pub featured: Option<bool>,
    #[validate(custom(function = "known_status"))]
    pub status: Option<String>,
    pub artisan: Option<String>,
    pub dietary: Option<Vec<String>>,
    pub origin: Option<String>,
    pub nutritional_info: Option<NutritionalInfo>,
    pub ingredients: Option<String>,
    pub variants: Option<BTreeMap<String, serde_json::Value>>,
}

impl ProductUpdate {
    pub fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name.trim().to_string();
        }
        if let Some(slug) = self.slug.filter(|s| !s.trim().is_empty()) {
            product.slug = slug.trim().to_string();
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if self.compare_at_price.is_some() {
            product.compare_at_price = self.compare_at_price;
        }
        if self.sale_price.is_some() {
            product.sale_price = self.sale_price;
        }
        if self.sku.is_some() {
            product.sku = self.sku;
        }
        if let Some(images) = self.images {
            product.images = images;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(featured) = self.featured {
            product.featured = featured;
        }
        if let Some(status) = self.status.as_deref().and_then(ProductStatus::parse) {
            product.status = status;
        }
        if let Some(artisan) = self.artisan {
            product.artisan = artisan;
        }
        if let Some(dietary) = self.dietary {
            product.dietary = dietary;
        }
        if let Some(origin) = self.origin {
            product.origin = origin;
        }
        if let Some(info) = self.nutritional_info {
            product.nutritional_info = info;
        }
        if let Some(ingredients) = self.ingredients {
            product.ingredients = ingredients;
        }
        if let Some(variants) = self.variants {
            product.variants = variants;
        }
        product.updated_at = mongodb::bson::DateTime::now();
    }
}

// ==================== Reviews ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: String,
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummary>,
    pub clerk_id: String,
    pub user_name: String,
    pub rating: u8,
    pub title: String,
    pub comment: String,
    pub images: Vec<String>,
    pub verified_purchase: bool,
    pub status: ReviewStatus,
    pub helpful: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Review> for ReviewResponse {
    fn from(r: Review) -> Self {
        Self {
            id: hex_id(r.id),
            product_id: r.product.to_hex(),
            product: None,
            clerk_id: r.clerk_id,
            user_name: r.user_name,
            rating: r.rating,
            title: r.title,
            comment: r.comment,
            images: r.images,
            verified_purchase: r.verified_purchase,
            status: r.status,
            helpful: r.helpful,
            created_at: iso(r.created_at),
            updated_at: iso(r.updated_at),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
    pub average_rating: f64,
    pub total_reviews: u32,
    pub distribution: RatingDistribution,
}

impl From<RatingSummary> for RatingStats {
    fn from(s: RatingSummary) -> Self {
        Self {
            average_rating: s.average,
            total_reviews: s.count,
            distribution: s.distribution,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub product_id: Option<String>,
    pub order_id: Option<String>,
    pub rating: Option<i64>,
    #[validate(length(max = 100, message = "Title cannot exceed 100 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 1000, message = "Comment cannot exceed 1000 characters"))]
    pub comment: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateReviewRequest {
    pub rating: Option<i64>,
    #[validate(length(max = 100, message = "Title cannot exceed 100 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 1000, message = "Comment cannot exceed 1000 characters"))]
    pub comment: Option<String>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub vote: Option<String>,
}

// ==================== Wishlist ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItemResponse {
    pub product: ProductSummary,
    pub added_at: String,
}

#[derive(Debug, Serialize)]
pub struct WishlistResponse {
    pub products: Vec<WishlistItemResponse>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistAddRequest {
    pub product_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> serde_json::Value {
        serde_json::json!({
            "name": "Wildflower Honey",
            "description": "Raw honey",
            "price": 12.5,
            "category": "Honey & Preserves",
            "artisan": "Bee Farm",
            "stock": 20
        })
    }

    #[test]
    fn product_input_derives_slug_and_defaults() {
        let input: ProductInput = serde_json::from_value(input()).unwrap();
        assert!(input.validate().is_ok());

        let product = input.into_product();
        assert_eq!(product.slug, "wildflower-honey");
        assert_eq!(product.status, ProductStatus::Published);
        assert_eq!(product.rating, 0.0);
    }

    #[test]
    fn product_input_rejects_unknown_category_and_negative_price() {
        let mut raw = input();
        raw["category"] = "Electronics".into();
        raw["price"] = serde_json::json!(-1);
        let input: ProductInput = serde_json::from_value(raw).unwrap();

        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("category"));
        assert!(fields.contains_key("price"));
    }

    #[test]
    fn partial_update_touches_only_given_fields() {
        let mut product = serde_json::from_value::<ProductInput>(input())
            .unwrap()
            .into_product();
        let update: ProductUpdate =
            serde_json::from_value(serde_json::json!({ "stock": 3, "salePrice": 9.99 })).unwrap();
        update.apply(&mut product);

        assert_eq!(product.stock, 3);
        assert_eq!(product.sale_price, Some(Decimal::new(999, 2)));
        assert_eq!(product.name, "Wildflower Honey");
    }
}
