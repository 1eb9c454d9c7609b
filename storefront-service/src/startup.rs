//! Application startup and lifecycle management.

use std::net::SocketAddr;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::handlers::{
    self, admin, cart, email, gift_cards, health, orders, payments, products, reviews, uploads,
    users, wishlist,
};
use crate::middleware::session::SESSION_HEADER;
use crate::services::cloudinary::{MAX_FILES, MAX_FILE_BYTES};
use crate::services::{CloudinaryClient, EmailService, PricingPolicy, StorefrontDb, StripeClient};

/// Multipart bodies may carry a full batch of images plus form overhead.
const UPLOAD_BODY_LIMIT: usize = MAX_FILES * MAX_FILE_BYTES + 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: StorefrontDb,
    pub config: Config,
    pub stripe: StripeClient,
    pub cloudinary: CloudinaryClient,
    pub email: EmailService,
    pub policy: PricingPolicy,
    pub rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire up clients from configuration. The MongoDB client connects
    /// lazily, so nothing here touches the network.
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let db = StorefrontDb::connect(
            config.database.url.expose_secret(),
            &config.database.db_name,
            &config.service_name,
        )
        .await?;

        let stripe = StripeClient::new(config.stripe.clone());
        if stripe.is_configured() {
            tracing::info!(test_mode = stripe.is_test_mode(), "Stripe client initialized");
        } else {
            tracing::warn!("Stripe credentials not configured - payment features will be limited");
        }

        let cloudinary = CloudinaryClient::new(config.cloudinary.clone());
        if !cloudinary.is_configured() {
            tracing::warn!("Cloudinary credentials not configured - image uploads will fail");
        }

        let email = EmailService::from_config(&config.email, &config.server.frontend_url)?;

        Ok(Self {
            db,
            stripe,
            cloudinary,
            email,
            policy: config.pricing.clone(),
            rate_limiter: create_ip_rate_limiter(
                config.server.rate_limit_per_minute,
                config.server.trust_proxy,
            ),
            config,
        })
    }
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let origin = match frontend_url.trim_end_matches('/').parse::<HeaderValue>() {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(e) => {
            tracing::error!("Invalid CORS origin '{}': {}. Using fallback.", frontend_url, e);
            AllowOrigin::any()
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(SESSION_HEADER),
        ])
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(products::list_products))
        .route("/api/products/:id", get(products::get_product))
}

fn cart_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/cart",
            get(cart::get_cart)
                .post(cart::add_to_cart)
                .delete(cart::clear_cart),
        )
        .route(
            "/api/cart/promo",
            post(cart::apply_promo).delete(cart::remove_promo),
        )
        .route("/api/cart/merge", post(cart::merge_cart))
        .route(
            "/api/cart/:item_id",
            put(cart::update_cart_item).delete(cart::remove_cart_item),
        )
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/orders",
            get(orders::list_orders).post(orders::create_order),
        )
        .route(
            "/api/orders/create-payment-intent",
            post(orders::create_payment_intent),
        )
        .route("/api/orders/my-orders", get(orders::my_orders))
        .route("/api/orders/track/:order_number", get(orders::track_order))
        .route("/api/orders/:id", get(orders::get_order))
        .route(
            "/api/orders/:id/confirm-payment",
            post(orders::confirm_order_payment),
        )
        .route("/api/orders/:id/status", put(orders::update_order_status))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/api/payment/create-intent", post(payments::create_intent))
        .route("/api/payment/checkout", post(payments::checkout))
        .route("/api/payment/confirm", post(payments::confirm_payment))
        .route("/api/payment/intent/:id", get(payments::get_intent))
        .route("/api/payment/refund", post(payments::refund))
        .route("/api/payment/webhook", post(payments::webhook))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/webhook", post(users::clerk_webhook))
        .route("/api/users/sync", post(users::sync_user))
        .route("/api/users/me", get(users::get_me).put(users::update_me))
        .route("/api/users/me/addresses", post(users::add_address))
        .route(
            "/api/users/me/addresses/:address_id",
            delete(users::remove_address),
        )
        .route("/api/users/me/wishlist", get(users::my_wishlist))
        .route(
            "/api/users/me/wishlist/:product_id",
            post(users::add_to_my_wishlist).delete(users::remove_from_my_wishlist),
        )
}

fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/wishlist",
            get(wishlist::get_wishlist)
                .post(wishlist::add_to_wishlist)
                .delete(wishlist::clear_wishlist),
        )
        .route(
            "/api/wishlist/check/:product_id",
            get(wishlist::check_wishlist),
        )
        .route(
            "/api/wishlist/:product_id",
            delete(wishlist::remove_from_wishlist),
        )
}

fn review_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/reviews",
            get(reviews::my_reviews).post(reviews::create_review),
        )
        .route(
            "/api/reviews/product/:product_id",
            get(reviews::product_reviews),
        )
        .route(
            "/api/reviews/can-review/:product_id",
            get(reviews::can_review),
        )
        .route(
            "/api/reviews/:id",
            put(reviews::update_review).delete(reviews::delete_review),
        )
        .route("/api/reviews/:id/helpful", post(reviews::vote_helpful))
}

fn gift_card_routes() -> Router<AppState> {
    Router::new()
        .route("/api/gift-cards", post(gift_cards::purchase))
        .route("/api/gift-cards/balance/:code", get(gift_cards::balance))
        .route("/api/gift-cards/redeem", post(gift_cards::redeem))
        .route("/api/gift-cards/validate", post(gift_cards::validate))
        .route("/api/gift-cards/my-cards", get(gift_cards::my_cards))
}

fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/api/upload/single", post(uploads::upload_single))
        .route("/api/upload/multiple", post(uploads::upload_multiple))
        .route("/api/upload/delete-multiple", post(uploads::delete_multiple))
        .route("/api/upload/:public_id", delete(uploads::delete_image))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

fn email_routes() -> Router<AppState> {
    Router::new()
        .route("/api/email/test", post(email::send_test))
        .route("/api/email/welcome", post(email::send_welcome))
        .route("/api/email/contact", post(email::contact))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/analytics", get(admin::analytics))
        .route("/api/admin/orders", get(admin::list_orders))
        .route(
            "/api/admin/orders/:id/status",
            put(admin::update_order_status),
        )
        .route("/api/admin/customers", get(admin::customers))
        .route("/api/admin/customers/:id", get(admin::customer_detail))
        .route(
            "/api/admin/products",
            get(admin::list_products).post(admin::create_product),
        )
        .route(
            "/api/admin/products/:id",
            put(admin::update_product).delete(admin::delete_product),
        )
        .route("/api/admin/inventory", get(admin::inventory))
}

/// Assemble every route and the middleware stack around them.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.frontend_url);
    let limiter = state.rate_limiter.clone();

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_endpoint))
        .merge(product_routes())
        .merge(cart_routes())
        .merge(order_routes())
        .merge(payment_routes())
        .merge(user_routes())
        .merge(wishlist_routes())
        .merge(review_routes())
        .merge(gift_card_routes())
        .merge(upload_routes())
        .merge(email_routes())
        .merge(admin_routes())
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(from_fn_with_state(limiter, ip_rate_limit_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application: connect, ensure indexes and bind the listener.
    /// Port 0 binds a random port, which the tests rely on.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let state = AppState::new(config.clone()).await?;

        state.db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| {
                tracing::error!("Invalid listen address: {}", e);
                AppError::InternalError(anyhow::anyhow!("Invalid listen address: {}", e))
            })?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let http_port = listener.local_addr()?.port();

        tracing::info!(
            service = %config.service_name,
            environment = ?config.environment,
            port = http_port,
            "Storefront service listening"
        );

        Ok(Self {
            http_port,
            listener,
            state,
        })
    }

    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn db(&self) -> &StorefrontDb {
        &self.state.db
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Serve until Ctrl+C or SIGTERM, then drain in-flight requests.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("Service shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
