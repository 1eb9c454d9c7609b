use config::Value;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::error::AppError;

use crate::services::pricing::PricingPolicy;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub pricing: PricingPolicy,
    pub stripe: StripeConfig,
    pub cloudinary: CloudinaryConfig,
    pub email: EmailConfig,
    pub auth: AuthConfig,
    pub observability: ObservabilityConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    /// Development shortcuts (`clerkId:` bearer tokens, unverified intents)
    /// are only honoured outside production.
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub rate_limit_per_minute: u32,
    /// Key rate limits on `x-forwarded-for`; only safe behind a proxy that
    /// overwrites the header.
    pub trust_proxy: bool,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub db_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    pub webhook_secret: Secret<String>,
    pub api_base_url: String,
    pub currency: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: Secret<String>,
    pub api_base_url: String,
    pub default_folder: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: Secret<String>,
    pub from_address: String,
    pub from_name: String,
    pub store_inbox: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AuthConfig {
    pub clerk_jwt_public_key: Secret<String>,
    pub clerk_webhook_secret: Secret<String>,
    #[serde(default)]
    pub admin_user_ids: Vec<String>,
}

impl AuthConfig {
    pub fn is_admin(&self, clerk_id: &str) -> bool {
        self.admin_user_ids.iter().any(|id| id == clerk_id)
    }

    pub fn has_jwt_key(&self) -> bool {
        !self.clerk_jwt_public_key.expose_secret().trim().is_empty()
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

fn defaults() -> Vec<(&'static str, Value)> {
    vec![
        ("service_name", Value::from("storefront-service")),
        ("environment", Value::from("development")),
        ("server.host", Value::from("0.0.0.0")),
        ("server.port", Value::from(5000_i64)),
        ("server.frontend_url", Value::from("http://localhost:3002")),
        ("server.rate_limit_per_minute", Value::from(300_i64)),
        ("server.trust_proxy", Value::from(false)),
        ("database.url", Value::from("mongodb://localhost:27017")),
        ("database.db_name", Value::from("artisio")),
        ("pricing.tax_rate", Value::from("0.08")),
        ("pricing.free_shipping_threshold", Value::from("50")),
        ("pricing.flat_shipping", Value::from("15")),
        ("pricing.express_shipping", Value::from("14.99")),
        ("pricing.overnight_shipping", Value::from("29.99")),
        ("pricing.gift_wrap_fee", Value::from("5")),
        ("stripe.secret_key", Value::from("")),
        ("stripe.webhook_secret", Value::from("")),
        ("stripe.api_base_url", Value::from("https://api.stripe.com/v1")),
        ("stripe.currency", Value::from("usd")),
        ("cloudinary.cloud_name", Value::from("")),
        ("cloudinary.api_key", Value::from("")),
        ("cloudinary.api_secret", Value::from("")),
        (
            "cloudinary.api_base_url",
            Value::from("https://api.cloudinary.com/v1_1"),
        ),
        ("cloudinary.default_folder", Value::from("artisio/products")),
        ("email.enabled", Value::from(false)),
        ("email.smtp_host", Value::from("smtp.gmail.com")),
        ("email.smtp_port", Value::from(587_i64)),
        ("email.username", Value::from("")),
        ("email.password", Value::from("")),
        ("email.from_address", Value::from("orders@artisio.com")),
        ("email.from_name", Value::from("Artisio")),
        ("email.store_inbox", Value::from("hello@artisio.com")),
        ("auth.clerk_jwt_public_key", Value::from("")),
        ("auth.clerk_webhook_secret", Value::from("")),
        ("observability.log_level", Value::from("info")),
    ]
}

impl Config {
    /// Loads defaults, an optional `configuration` file and `STOREFRONT__*`
    /// environment variables, in that order of precedence.
    pub fn load() -> Result<Self, AppError> {
        service_core::config::load("STOREFRONT", &defaults(), &["auth.admin_user_ids"])
    }

    /// Configuration suitable for tests: development shortcuts enabled, all
    /// third-party integrations unconfigured.
    pub fn for_tests(database_url: &str, db_name: &str) -> Self {
        Self {
            environment: Environment::Test,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                frontend_url: "http://localhost:3002".to_string(),
                rate_limit_per_minute: 10_000,
                trust_proxy: false,
            },
            database: DatabaseConfig {
                url: Secret::new(database_url.to_string()),
                db_name: db_name.to_string(),
            },
            pricing: PricingPolicy::default(),
            stripe: StripeConfig {
                secret_key: Secret::new(String::new()),
                webhook_secret: Secret::new(String::new()),
                api_base_url: "https://api.stripe.com/v1".to_string(),
                currency: "usd".to_string(),
            },
            cloudinary: CloudinaryConfig {
                cloud_name: String::new(),
                api_key: String::new(),
                api_secret: Secret::new(String::new()),
                api_base_url: "https://api.cloudinary.com/v1_1".to_string(),
                default_folder: "artisio/products".to_string(),
            },
            email: EmailConfig {
                enabled: false,
                smtp_host: "localhost".to_string(),
                smtp_port: 1025,
                username: String::new(),
                password: Secret::new(String::new()),
                from_address: "orders@artisio.test".to_string(),
                from_name: "Artisio".to_string(),
                store_inbox: "hello@artisio.test".to_string(),
            },
            auth: AuthConfig {
                clerk_jwt_public_key: Secret::new(String::new()),
                clerk_webhook_secret: Secret::new(String::new()),
                admin_user_ids: vec!["user_admin".to_string()],
            },
            observability: ObservabilityConfig {
                log_level: "debug".to_string(),
                otlp_endpoint: None,
            },
            service_name: "storefront-service-test".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_builtin_defaults() {
        let config = Config::load().unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.frontend_url, "http://localhost:3002");
        assert!(!config.server.trust_proxy);
        assert_eq!(config.pricing, PricingPolicy::default());
        assert_eq!(config.cloudinary.default_folder, "artisio/products");
    }

    #[test]
    fn admin_membership() {
        let config = Config::for_tests("mongodb://localhost:27017", "t");
        assert!(config.auth.is_admin("user_admin"));
        assert!(!config.auth.is_admin("user_shopper"));
        assert!(!config.auth.has_jwt_key());
    }
}
