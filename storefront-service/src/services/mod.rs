pub mod analytics;
pub mod cloudinary;
pub mod database;
pub mod email;
pub mod metrics;
pub mod pricing;
pub mod stripe;

pub use cloudinary::CloudinaryClient;
pub use database::StorefrontDb;
pub use email::EmailService;
pub use pricing::PricingPolicy;
pub use stripe::StripeClient;
