//! MongoDB access for the storefront.
//!
//! [`StorefrontDb`] owns the typed collections, creates indexes at startup
//! and holds the handful of queries shared by more than one resource.

use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime, Document},
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::collections::HashMap;
use std::time::Duration;

use crate::models::{
    Cart, CartOwner, GiftCard, Order, Product, RatingSummary, Review, ReviewStatus, User, Wishlist,
};

pub const PRODUCTS: &str = "products";
pub const CARTS: &str = "carts";
pub const ORDERS: &str = "orders";
pub const USERS: &str = "users";
pub const REVIEWS: &str = "reviews";
pub const WISHLISTS: &str = "wishlists";
pub const GIFT_CARDS: &str = "gift_cards";

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct StorefrontDb {
    client: Client,
    db: Database,
}

/// True when a write failed on a unique index.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// [`is_duplicate_key`] for a write that already went through `?`.
pub fn is_duplicate_key_error(err: &AppError) -> bool {
    match err {
        AppError::DatabaseError(inner) => inner
            .downcast_ref::<mongodb::error::Error>()
            .is_some_and(is_duplicate_key),
        _ => false,
    }
}

/// Escape a shopper-supplied string for use inside a `$regex`.
pub fn regex_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if "\\^$.|?*+()[]{}/-".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn index(keys: Document, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().name(name.to_string()).build())
        .build()
}

fn unique_index(keys: Document, name: &str, sparse: bool) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .name(name.to_string())
                .unique(true)
                .sparse(sparse)
                .build(),
        )
        .build()
}

/// Unique over documents where `field` holds a string; unset and null
/// values stay out of the index.
fn unique_when_present(field: &str, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(doc! { field: 1 })
        .options(
            IndexOptions::builder()
                .name(name.to_string())
                .unique(true)
                .partial_filter_expression(doc! { field: { "$type": "string" } })
                .build(),
        )
        .build()
}

impl StorefrontDb {
    pub async fn connect(uri: &str, database: &str, app_name: &str) -> Result<Self, AppError> {
        let mut options = ClientOptions::parse(uri).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse MongoDB connection string");
            AppError::DatabaseError(anyhow::anyhow!("Invalid MongoDB URI: {}", e))
        })?;
        options.app_name = Some(app_name.to_string());

        let client = Client::with_options(options).map_err(|e| {
            tracing::error!(error = %e, "Failed to create MongoDB client");
            AppError::DatabaseError(anyhow::anyhow!("Failed to create MongoDB client: {}", e))
        })?;
        let db = client.database(database);

        tracing::info!(database = %database, "Connected to MongoDB");
        Ok(Self { client, db })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn products(&self) -> Collection<Product> {
        self.db.collection(PRODUCTS)
    }

    pub fn carts(&self) -> Collection<Cart> {
        self.db.collection(CARTS)
    }

    pub fn orders(&self) -> Collection<Order> {
        self.db.collection(ORDERS)
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection(USERS)
    }

    pub fn reviews(&self) -> Collection<Review> {
        self.db.collection(REVIEWS)
    }

    pub fn wishlists(&self) -> Collection<Wishlist> {
        self.db.collection(WISHLISTS)
    }

    pub fn gift_cards(&self) -> Collection<GiftCard> {
        self.db.collection(GIFT_CARDS)
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Database health check failed");
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        self.products()
            .create_indexes(
                [
                    unique_index(doc! { "slug": 1 }, "slug_unique", false),
                    index(doc! { "name": 1 }, "name_idx"),
                    index(doc! { "category": 1 }, "category_idx"),
                ],
                None,
            )
            .await
            .map_err(index_error)?;

        let guest_ttl = IndexModel::builder()
            .keys(doc! { "expires_at": 1 })
            .options(
                IndexOptions::builder()
                    .name("guest_cart_ttl".to_string())
                    .expire_after(Duration::from_secs(0))
                    .build(),
            )
            .build();
        self.carts()
            .create_indexes(
                [
                    unique_index(doc! { "clerk_id": 1 }, "clerk_id_unique", true),
                    unique_index(doc! { "session_id": 1 }, "session_id_unique", true),
                    guest_ttl,
                ],
                None,
            )
            .await
            .map_err(index_error)?;

        self.orders()
            .create_indexes(
                [
                    unique_index(doc! { "order_number": 1 }, "order_number_unique", false),
                    index(doc! { "clerk_id": 1 }, "clerk_id_idx"),
                    unique_when_present("stripe_payment_intent_id", "stripe_payment_intent_unique"),
                    index(doc! { "created_at": -1 }, "created_at_idx"),
                ],
                None,
            )
            .await
            .map_err(index_error)?;

        self.users()
            .create_indexes(
                [
                    unique_index(doc! { "clerk_id": 1 }, "clerk_id_unique", false),
                    unique_index(doc! { "email": 1 }, "email_unique", false),
                ],
                None,
            )
            .await
            .map_err(index_error)?;

        self.reviews()
            .create_index(
                unique_index(doc! { "product": 1, "clerk_id": 1 }, "product_reviewer_unique", false),
                None,
            )
            .await
            .map_err(index_error)?;

        self.wishlists()
            .create_index(unique_index(doc! { "clerk_id": 1 }, "clerk_id_unique", false), None)
            .await
            .map_err(index_error)?;

        self.gift_cards()
            .create_indexes(
                [
                    unique_index(doc! { "code": 1 }, "code_unique", false),
                    index(doc! { "purchased_by": 1 }, "purchased_by_idx"),
                ],
                None,
            )
            .await
            .map_err(index_error)?;

        tracing::info!("Storefront indexes initialized");
        Ok(())
    }

    // ==================== Products ====================

    pub async fn product_by_id(&self, id: &ObjectId) -> Result<Option<Product>, AppError> {
        Ok(self.products().find_one(doc! { "_id": id }, None).await?)
    }

    /// Resolve a product by slug, falling back to its ObjectId.
    pub async fn find_product(&self, id_or_slug: &str) -> Result<Option<Product>, AppError> {
        if let Some(product) = self
            .products()
            .find_one(doc! { "slug": id_or_slug }, None)
            .await?
        {
            return Ok(Some(product));
        }
        match ObjectId::parse_str(id_or_slug) {
            Ok(id) => self.product_by_id(&id).await,
            Err(_) => Ok(None),
        }
    }

    pub async fn products_by_ids(
        &self,
        ids: &[ObjectId],
    ) -> Result<HashMap<ObjectId, Product>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let products: Vec<Product> = self
            .products()
            .find(doc! { "_id": { "$in": ids } }, None)
            .await?
            .try_collect()
            .await?;
        Ok(products
            .into_iter()
            .filter_map(|p| p.id.map(|id| (id, p)))
            .collect())
    }

    /// Recompute a product's rating, review count and star distribution
    /// from its approved reviews.
    pub async fn refresh_product_rating(&self, product: &ObjectId) -> Result<RatingSummary, AppError> {
        let reviews: Vec<Review> = self
            .reviews()
            .find(
                doc! {
                    "product": product,
                    "status": mongodb::bson::to_bson(&ReviewStatus::Approved)?,
                },
                None,
            )
            .await?
            .try_collect()
            .await?;
        let summary = RatingSummary::from_ratings(reviews.iter().map(|r| r.rating));

        self.products()
            .update_one(
                doc! { "_id": product },
                doc! {
                    "$set": {
                        "rating": summary.average,
                        "review_count": i64::from(summary.count),
                        "rating_distribution": mongodb::bson::to_bson(&summary.distribution)?,
                        "updated_at": DateTime::now(),
                    }
                },
                None,
            )
            .await?;

        tracing::debug!(product_id = %product, average = summary.average, count = summary.count, "Product rating refreshed");
        Ok(summary)
    }

    // ==================== Carts ====================

    pub async fn find_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, AppError> {
        Ok(self.carts().find_one(owner.filter(), None).await?)
    }

    /// Insert or replace a cart, refreshing its timestamps first.
    pub async fn save_cart(&self, cart: &mut Cart) -> Result<(), AppError> {
        cart.touch();
        match cart.id {
            Some(id) => {
                self.carts()
                    .replace_one(doc! { "_id": id }, &*cart, None)
                    .await?;
            }
            None => {
                let result = self.carts().insert_one(&*cart, None).await?;
                cart.id = result.inserted_id.as_object_id();
            }
        }
        Ok(())
    }

    pub async fn delete_cart(&self, owner: &CartOwner) -> Result<(), AppError> {
        self.carts().delete_one(owner.filter(), None).await?;
        Ok(())
    }

    // ==================== Orders ====================

    pub async fn order_by_id(&self, id: &ObjectId) -> Result<Option<Order>, AppError> {
        Ok(self.orders().find_one(doc! { "_id": id }, None).await?)
    }

    pub async fn order_by_payment_intent(&self, intent_id: &str) -> Result<Option<Order>, AppError> {
        Ok(self
            .orders()
            .find_one(doc! { "stripe_payment_intent_id": intent_id }, None)
            .await?)
    }

    pub async fn insert_order(&self, order: &mut Order) -> Result<(), AppError> {
        let result = self.orders().insert_one(&*order, None).await?;
        order.id = result.inserted_id.as_object_id();
        Ok(())
    }

    pub async fn replace_order(&self, order: &Order) -> Result<(), AppError> {
        let id = order
            .id
            .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("Order has no id")))?;
        self.orders()
            .replace_one(doc! { "_id": id }, order, None)
            .await?;
        Ok(())
    }

    pub async fn orders_for(&self, clerk_id: &str, limit: Option<i64>) -> Result<Vec<Order>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .build();
        Ok(self
            .orders()
            .find(doc! { "clerk_id": clerk_id }, options)
            .await?
            .try_collect()
            .await?)
    }

    /// Whether `clerk_id` has a paid order containing `product`.
    pub async fn has_purchased(&self, clerk_id: &str, product: &ObjectId) -> Result<bool, AppError> {
        let count = self
            .orders()
            .count_documents(
                doc! {
                    "clerk_id": clerk_id,
                    "items.product": product,
                    "payment_status": "paid",
                },
                None,
            )
            .await?;
        Ok(count > 0)
    }

    // ==================== Users ====================

    pub async fn user_by_clerk_id(&self, clerk_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users().find_one(doc! { "clerk_id": clerk_id }, None).await?)
    }

    pub async fn save_user(&self, user: &mut User) -> Result<(), AppError> {
        user.updated_at = DateTime::now();
        match user.id {
            Some(id) => {
                self.users()
                    .replace_one(doc! { "_id": id }, &*user, None)
                    .await?;
            }
            None => {
                let result = self.users().insert_one(&*user, None).await?;
                user.id = result.inserted_id.as_object_id();
            }
        }
        Ok(())
    }

    /// Credit a purchase to a shopper's totals and loyalty tier. Unknown
    /// shoppers are skipped.
    pub async fn record_purchase(&self, clerk_id: &str, total: rust_decimal::Decimal) -> Result<(), AppError> {
        if let Some(mut user) = self.user_by_clerk_id(clerk_id).await? {
            user.record_purchase(total);
            self.save_user(&mut user).await?;
            tracing::info!(clerk_id = %clerk_id, tier = ?user.loyalty_tier, "Purchase recorded");
        }
        Ok(())
    }

    // ==================== Wishlists ====================

    pub async fn wishlist_for(&self, clerk_id: &str) -> Result<Option<Wishlist>, AppError> {
        Ok(self
            .wishlists()
            .find_one(doc! { "clerk_id": clerk_id }, None)
            .await?)
    }

    pub async fn save_wishlist(&self, wishlist: &mut Wishlist) -> Result<(), AppError> {
        match wishlist.id {
            Some(id) => {
                self.wishlists()
                    .replace_one(doc! { "_id": id }, &*wishlist, None)
                    .await?;
            }
            None => {
                let result = self.wishlists().insert_one(&*wishlist, None).await?;
                wishlist.id = result.inserted_id.as_object_id();
            }
        }
        Ok(())
    }
}

fn index_error(e: mongodb::error::Error) -> AppError {
    tracing::error!(error = %e, "Failed to create index");
    AppError::DatabaseError(anyhow::anyhow!("Failed to create index: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_escape_neutralises_metacharacters() {
        assert_eq!(regex_escape("honey"), "honey");
        assert_eq!(regex_escape("a.b*c"), "a\\.b\\*c");
        assert_eq!(regex_escape("(50%)"), "\\(50%\\)");
    }

    #[test]
    fn only_database_errors_count_as_duplicates() {
        assert!(!is_duplicate_key_error(&AppError::bad_request("nope")));
        assert!(!is_duplicate_key_error(&AppError::DatabaseError(anyhow::anyhow!(
            "E11000 duplicate key error"
        ))));
    }
}
