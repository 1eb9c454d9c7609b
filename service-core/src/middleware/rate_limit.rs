use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};

type KeyedLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>;

/// Rate limiter keyed by client IP address.
///
/// The peer address is the key. `x-forwarded-for` is only honoured when the
/// service runs behind a proxy that overwrites it.
#[derive(Clone)]
pub struct IpRateLimiter {
    limiter: Arc<KeyedLimiter>,
    trust_forwarded_for: bool,
}

/// Create a keyed rate limiter allowing `per_minute` requests per IP with an
/// equal burst.
pub fn create_ip_rate_limiter(per_minute: u32, trust_forwarded_for: bool) -> IpRateLimiter {
    let per_minute = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
    IpRateLimiter {
        limiter: Arc::new(RateLimiter::dashmap(Quota::per_minute(per_minute))),
        trust_forwarded_for,
    }
}

impl IpRateLimiter {
    fn client_ip(&self, request: &Request) -> Option<IpAddr> {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        if !self.trust_forwarded_for {
            return peer;
        }

        request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
            .or(peer)
    }
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match limiter.client_ip(&request) {
        Some(ip) => match limiter.limiter.check_key(&ip) {
            Ok(_) => Ok(next.run(request).await),
            Err(negative) => {
                let wait_time = negative.wait_time_from(DefaultClock::default().now());
                tracing::warn!(ip = %ip, "Rate limit exceeded");
                Err(AppError::TooManyRequests(
                    "Too many requests from this IP. Please try again later.".to_string(),
                    Some(wait_time.as_secs().max(1)),
                ))
            }
        },
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            Ok(next.run(request).await)
        }
    }
}
