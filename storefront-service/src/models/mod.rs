pub mod cart;
pub mod gift_card;
pub mod order;
pub mod product;
pub mod promo;
pub mod review;
pub mod user;
pub mod wishlist;

pub use cart::{Cart, CartItem, CartOwner};
pub use gift_card::{DeliveryMethod, GiftCard, GiftCardError, GiftCardStatus, GiftCardUsage};
pub use order::{
    Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress, ShippingMethod,
    StatusHistoryEntry,
};
pub use product::{NutritionalInfo, Product, ProductStatus, RatingDistribution};
pub use promo::{PromoDiscount, PromoKind};
pub use review::{HelpfulVote, RatingSummary, Review, ReviewStatus, Vote};
pub use user::{Address, LoyaltyTier, Preferences, User};
pub use wishlist::{Wishlist, WishlistEntry};

use mongodb::bson::oid::ObjectId;
use service_core::error::AppError;

/// Parse a 24-hex path/body id, reporting `what` as missing on failure so
/// malformed ids behave like unknown ones.
pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::not_found(format!("{} not found", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_ids_read_as_not_found() {
        let err = parse_object_id("not-an-id", "Order").unwrap_err();
        assert_eq!(err.to_string(), "Not found: Order not found");

        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex(), "Order").unwrap(), id);
    }
}
