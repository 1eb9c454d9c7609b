//! Product reviews and helpfulness votes.
//!
//! Every write recomputes the product's rating aggregate from its approved
//! reviews.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::FindOptions;
use serde_json::{json, Value};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{
    created, skip_for, ApiResponse, CreateReviewRequest, Pagination, ProductSummary, RatingStats,
    ReviewListQuery, ReviewResponse, UpdateReviewRequest, VoteRequest,
};
use crate::middleware::RequireAuth;
use crate::models::{parse_object_id, RatingSummary, Review, ReviewStatus, Vote};
use crate::services::database::is_duplicate_key;
use crate::AppState;

/// Sort order for a product's review list. Unknown values fall back to
/// newest first.
pub fn sort_for(sort: Option<&str>) -> Document {
    match sort.unwrap_or("newest") {
        "oldest" => doc! { "created_at": 1 },
        "highest" => doc! { "rating": -1, "created_at": -1 },
        "lowest" => doc! { "rating": 1, "created_at": -1 },
        "helpful" => doc! { "helpful": -1, "created_at": -1 },
        _ => doc! { "created_at": -1 },
    }
}

fn check_rating(rating: i64) -> Result<u8, AppError> {
    match u8::try_from(rating) {
        Ok(r @ 1..=5) => Ok(r),
        _ => Err(AppError::bad_request("Rating must be between 1 and 5")),
    }
}

fn approved_filter(product: &ObjectId) -> Result<Document, AppError> {
    Ok(doc! {
        "product": product,
        "status": mongodb::bson::to_bson(&ReviewStatus::Approved)?,
    })
}

async fn load_review(state: &AppState, id: &str) -> Result<Review, AppError> {
    let id = parse_object_id(id, "Review")?;
    state
        .db
        .reviews()
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| AppError::not_found("Review not found"))
}

async fn save_review(state: &AppState, review: &Review) -> Result<(), AppError> {
    let id = review
        .id
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("Review has no id")))?;
    state
        .db
        .reviews()
        .replace_one(doc! { "_id": id }, review, None)
        .await?;
    Ok(())
}

/// Approved reviews for a product, with pagination and rating stats.
pub async fn product_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    Query(query): Query<ReviewListQuery>,
) -> Result<Json<Value>, AppError> {
    let product = parse_object_id(&product_id, "Product")?;
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let filter = approved_filter(&product)?;

    let total = state.db.reviews().count_documents(filter.clone(), None).await?;
    let options = FindOptions::builder()
        .sort(sort_for(query.sort.as_deref()))
        .skip(skip_for(page, limit))
        .limit(limit as i64)
        .build();
    let reviews: Vec<Review> = state
        .db
        .reviews()
        .find(filter.clone(), options)
        .await?
        .try_collect()
        .await?;

    let all: Vec<Review> = state
        .db
        .reviews()
        .find(filter, None)
        .await?
        .try_collect()
        .await?;
    let stats = RatingStats::from(RatingSummary::from_ratings(all.iter().map(|r| r.rating)));

    let data: Vec<ReviewResponse> = reviews.into_iter().map(Into::into).collect();
    Ok(Json(json!({
        "success": true,
        "data": data,
        "pagination": Pagination::new(page, limit, total),
        "stats": stats,
    })))
}

/// The caller's own reviews with their products.
pub async fn my_reviews(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>, AppError> {
    let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
    let reviews: Vec<Review> = state
        .db
        .reviews()
        .find(doc! { "clerk_id": &user.clerk_id }, options)
        .await?
        .try_collect()
        .await?;

    let ids: Vec<ObjectId> = reviews.iter().map(|r| r.product).collect();
    let products = state.db.products_by_ids(&ids).await?;

    let data: Vec<ReviewResponse> = reviews
        .into_iter()
        .map(|review| {
            let product = products.get(&review.product).map(ProductSummary::from);
            ReviewResponse {
                product,
                ..review.into()
            }
        })
        .collect();

    Ok(Json(json!({ "success": true, "count": data.len(), "data": data })))
}

async fn verified_purchase(
    state: &AppState,
    clerk_id: &str,
    product: &ObjectId,
    order_id: Option<&str>,
) -> Result<bool, AppError> {
    if let Some(order_id) = order_id.and_then(|id| ObjectId::parse_str(id.trim()).ok()) {
        if let Some(order) = state.db.order_by_id(&order_id).await? {
            if order.belongs_to(clerk_id) && order.items.iter().any(|i| &i.product == product) {
                return Ok(true);
            }
        }
    }
    state.db.has_purchased(clerk_id, product).await
}

pub async fn create_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<(StatusCode, ApiResponse<ReviewResponse>), AppError> {
    let (Some(product_id), Some(rating), Some(title), Some(comment)) = (
        payload.product_id.as_deref().filter(|s| !s.trim().is_empty()),
        payload.rating,
        payload.title.as_deref().filter(|s| !s.trim().is_empty()),
        payload.comment.as_deref().filter(|s| !s.trim().is_empty()),
    ) else {
        return Err(AppError::bad_request("Please provide all required fields"));
    };
    payload.validate()?;
    let rating = check_rating(rating)?;

    let product = parse_object_id(product_id, "Product")?;
    if state.db.product_by_id(&product).await?.is_none() {
        return Err(AppError::not_found("Product not found"));
    }

    let already = state
        .db
        .reviews()
        .count_documents(doc! { "product": product, "clerk_id": &user.clerk_id }, None)
        .await?;
    if already > 0 {
        return Err(AppError::bad_request("You have already reviewed this product"));
    }

    let user_name = state
        .db
        .user_by_clerk_id(&user.clerk_id)
        .await?
        .map(|u| u.full_name())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "Anonymous".to_string());

    let verified = verified_purchase(&state, &user.clerk_id, &product, payload.order_id.as_deref()).await?;

    let now = DateTime::now();
    let mut review = Review {
        id: None,
        product,
        clerk_id: user.clerk_id.clone(),
        user_name,
        rating,
        title: title.trim().to_string(),
        comment: comment.trim().to_string(),
        images: payload.images.clone(),
        verified_purchase: verified,
        status: ReviewStatus::Approved,
        helpful_votes: Vec::new(),
        helpful: 0,
        created_at: now,
        updated_at: now,
    };

    let result = state.db.reviews().insert_one(&review, None).await.map_err(|e| {
        if is_duplicate_key(&e) {
            AppError::bad_request("You have already reviewed this product")
        } else {
            AppError::from(e)
        }
    })?;
    review.id = result.inserted_id.as_object_id();

    state.db.refresh_product_rating(&product).await?;

    tracing::info!(product_id = %product, rating, verified, "Review submitted");
    Ok(created(ApiResponse::with_message(
        review.into(),
        "Review submitted successfully",
    )))
}

pub async fn update_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    Json(payload): Json<UpdateReviewRequest>,
) -> Result<ApiResponse<ReviewResponse>, AppError> {
    payload.validate()?;
    let mut review = load_review(&state, &id).await?;
    if review.clerk_id != user.clerk_id {
        return Err(AppError::forbidden("Not authorized to update this review"));
    }

    if let Some(rating) = payload.rating {
        review.rating = check_rating(rating)?;
    }
    if let Some(title) = payload.title {
        review.title = title.trim().to_string();
    }
    if let Some(comment) = payload.comment {
        review.comment = comment.trim().to_string();
    }
    if let Some(images) = payload.images {
        review.images = images;
    }
    review.updated_at = DateTime::now();

    save_review(&state, &review).await?;
    state.db.refresh_product_rating(&review.product).await?;

    Ok(ApiResponse::with_message(review.into(), "Review updated successfully"))
}

pub async fn delete_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    let review = load_review(&state, &id).await?;
    if review.clerk_id != user.clerk_id {
        return Err(AppError::forbidden("Not authorized to delete this review"));
    }

    state
        .db
        .reviews()
        .delete_one(doc! { "_id": review.id }, None)
        .await?;
    state.db.refresh_product_rating(&review.product).await?;

    Ok(ApiResponse::message("Review deleted successfully"))
}

/// Record a helpful / not-helpful vote. Voting again replaces the earlier
/// vote.
pub async fn vote_helpful(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
    Json(payload): Json<VoteRequest>,
) -> Result<ApiResponse<Value>, AppError> {
    let vote = payload
        .vote
        .as_deref()
        .and_then(Vote::parse)
        .ok_or_else(|| AppError::bad_request("Invalid vote type"))?;

    let mut review = load_review(&state, &id).await?;
    let helpful = review.cast_vote(&user.clerk_id, vote);
    review.updated_at = DateTime::now();
    save_review(&state, &review).await?;

    Ok(ApiResponse::with_message(
        json!({ "helpful": helpful }),
        "Thank you for your feedback",
    ))
}

/// Whether the caller may review a product, and why not.
pub async fn can_review(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<String>,
) -> Result<ApiResponse<Value>, AppError> {
    let product = parse_object_id(&product_id, "Product")?;

    let existing = state
        .db
        .reviews()
        .find_one(doc! { "product": product, "clerk_id": &user.clerk_id }, None)
        .await?;
    let has_purchased = state.db.has_purchased(&user.clerk_id, &product).await?;

    let body = match existing {
        Some(review) => json!({
            "canReview": false,
            "hasPurchased": has_purchased,
            "hasReviewed": true,
            "reason": "already_reviewed",
            "existingReview": ReviewResponse::from(review),
        }),
        None => json!({
            "canReview": true,
            "hasPurchased": has_purchased,
            "hasReviewed": false,
            "verifiedPurchase": has_purchased,
        }),
    };
    Ok(ApiResponse::ok(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_defaults_to_newest() {
        assert_eq!(sort_for(None), doc! { "created_at": -1 });
        assert_eq!(sort_for(Some("bogus")), doc! { "created_at": -1 });
        assert_eq!(sort_for(Some("oldest")), doc! { "created_at": 1 });
        assert_eq!(sort_for(Some("helpful")).get_i32("helpful").unwrap(), -1);
    }

    #[test]
    fn ratings_outside_one_to_five_are_rejected() {
        assert_eq!(check_rating(5).unwrap(), 5);
        assert!(check_rating(0).is_err());
        assert!(check_rating(6).is_err());
        assert!(check_rating(-1).is_err());
    }
}
