//! Replace the product catalog with the products in a JSON file.
//!
//! Usage: `storefront-seed <products.json>`

use anyhow::Context;
use mongodb::bson::doc;
use secrecy::ExposeSecret;
use service_core::observability::init_tracing;
use storefront_service::config::Config;
use storefront_service::dtos::ProductInput;
use storefront_service::models::Product;
use storefront_service::services::StorefrontDb;
use validator::Validate;

fn load_products(path: &str) -> anyhow::Result<Vec<Product>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
    let inputs: Vec<ProductInput> =
        serde_json::from_str(&raw).with_context(|| format!("{} is not a product array", path))?;

    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            input
                .validate()
                .with_context(|| format!("product #{} ({}) is invalid", index, input.name))?;
            Ok(input.into_product())
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let path = std::env::args()
        .nth(1)
        .context("usage: storefront-seed <products.json>")?;

    let config = Config::load()?;
    init_tracing(
        "storefront-seed",
        &config.observability.log_level,
        config.observability.otlp_endpoint.as_deref(),
    );

    let products = load_products(&path)?;

    let db = StorefrontDb::connect(
        config.database.url.expose_secret(),
        &config.database.db_name,
        "storefront-seed",
    )
    .await?;
    db.initialize_indexes().await?;

    let removed = db.products().delete_many(doc! {}, None).await?;
    tracing::info!(removed = removed.deleted_count, "Cleared products");

    if products.is_empty() {
        tracing::warn!(path = %path, "No products to insert");
        return Ok(());
    }

    let inserted = db.products().insert_many(&products, None).await?;
    tracing::info!(inserted = inserted.inserted_ids.len(), path = %path, "Products seeded");

    Ok(())
}
