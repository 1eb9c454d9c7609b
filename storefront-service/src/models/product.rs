use mongodb::bson::{oid::ObjectId, DateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Categories a product may be filed under.
pub const CATEGORIES: &[&str] = &[
    "Coffee",
    "Chocolate",
    "Honey & Preserves",
    "Oils & Vinegars",
    "Tea",
    "Spices",
    "Cheese",
    "Bakery",
    "Nuts & Snacks",
    "Pasta & Grains",
    "Condiments",
    "Beverages",
    "Food & Pantry",
    "Home & Living",
    "Jewelry",
    "Ceramics",
    "Textiles",
    "Art",
    "Accessories",
    "Beauty & Wellness",
];

pub const LOW_STOCK_THRESHOLD: i64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Published,
    Draft,
    Archived,
}

impl ProductStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "published" => Some(Self::Published),
            "draft" => Some(Self::Draft),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Draft => "draft",
            Self::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NutritionalInfo {
    pub serving_size: String,
    pub calories: f64,
    pub fat: String,
    pub carbs: String,
    pub protein: String,
    pub sugar: String,
    pub sodium: String,
    pub fiber: String,
    pub caffeine: String,
    pub calcium: String,
}

/// Count of approved reviews per star rating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingDistribution {
    #[serde(rename = "1")]
    pub one: u32,
    #[serde(rename = "2")]
    pub two: u32,
    #[serde(rename = "3")]
    pub three: u32,
    #[serde(rename = "4")]
    pub four: u32,
    #[serde(rename = "5")]
    pub five: u32,
}

impl RatingDistribution {
    pub fn record(&mut self, rating: u8) {
        match rating {
            1 => self.one += 1,
            2 => self.two += 1,
            3 => self.three += 1,
            4 => self.four += 1,
            5 => self.five += 1,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub category: String,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub rating_distribution: RatingDistribution,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub status: ProductStatus,
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
    #[serde(default = "DateTime::now")]
    pub created_at: DateTime,
    #[serde(default = "DateTime::now")]
    pub updated_at: DateTime,
}

impl Product {
    /// Price a shopper pays today: the sale price when one is set.
    pub fn effective_price(&self) -> Decimal {
        self.sale_price.unwrap_or(self.price)
    }

    pub fn has_stock_for(&self, quantity: u32) -> bool {
        self.stock >= i64::from(quantity)
    }

    pub fn first_image(&self) -> String {
        self.images.first().cloned().unwrap_or_default()
    }
}

/// URL slug for a product name: lowercase, spaces to hyphens, `&` and `'`
/// dropped.
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(' ')
        .collect::<Vec<_>>()
        .join("-")
        .replace(['&', '\''], "")
}

pub fn is_known_category(category: &str) -> bool {
    CATEGORIES.contains(&category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_matches_storefront_urls() {
        assert_eq!(slugify("Wildflower Honey"), "wildflower-honey");
        assert_eq!(slugify("Mom's Jam & Toast"), "moms-jam--toast");
        assert_eq!(slugify("  Dark Roast "), "dark-roast");
    }

    #[test]
    fn categories() {
        assert!(is_known_category("Honey & Preserves"));
        assert!(!is_known_category("Electronics"));
    }

    #[test]
    fn rating_distribution_serializes_star_keys() {
        let mut dist = RatingDistribution::default();
        dist.record(5);
        dist.record(5);
        dist.record(1);
        dist.record(9);

        let json = serde_json::to_value(dist).unwrap();
        assert_eq!(json["5"], 2);
        assert_eq!(json["1"], 1);
        assert_eq!(json["3"], 0);
    }

    #[test]
    fn effective_price_prefers_sale_price() {
        let mut product: Product = serde_json::from_value(serde_json::json!({
            "name": "Dark Roast",
            "slug": "dark-roast",
            "description": "Beans",
            "price": 18.5,
            "category": "Coffee",
            "artisan": "Roastery",
            "stock": 3
        }))
        .unwrap();

        assert_eq!(product.effective_price(), Decimal::new(185, 1));
        assert!(product.has_stock_for(3));
        assert!(!product.has_stock_for(4));

        product.sale_price = Some(Decimal::new(15, 0));
        assert_eq!(product.effective_price(), Decimal::new(15, 0));
        assert_eq!(product.status, ProductStatus::Published);
    }
}
