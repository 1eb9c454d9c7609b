//! Svix signature verification for Clerk webhooks.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use service_core::error::AppError;
use service_core::utils::signature::{hmac_sha256_base64, secure_compare};

pub const SVIX_ID: &str = "svix-id";
pub const SVIX_TIMESTAMP: &str = "svix-timestamp";
pub const SVIX_SIGNATURE: &str = "svix-signature";

/// Maximum clock skew accepted between Svix and us, in seconds.
pub const TOLERANCE_SECS: i64 = 300;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn signing_key(secret: &str) -> Result<Vec<u8>, AppError> {
    let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
    STANDARD
        .decode(encoded)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Malformed webhook secret: {}", e)))
}

/// Check the `svix-*` headers against the raw request body.
pub fn verify(headers: &HeaderMap, body: &[u8], secret: &str, now_secs: i64) -> Result<(), AppError> {
    let (Some(id), Some(timestamp), Some(signatures)) = (
        header(headers, SVIX_ID),
        header(headers, SVIX_TIMESTAMP),
        header(headers, SVIX_SIGNATURE),
    ) else {
        return Err(AppError::bad_request("Missing svix headers"));
    };

    let invalid = || AppError::bad_request("Invalid webhook signature");

    let sent_at: i64 = timestamp.parse().map_err(|_| invalid())?;
    if now_secs.abs_diff(sent_at) > TOLERANCE_SECS.unsigned_abs() {
        tracing::warn!(svix_id = %id, sent_at, "Webhook timestamp outside tolerance");
        return Err(invalid());
    }

    let mut signed = Vec::with_capacity(id.len() + timestamp.len() + body.len() + 2);
    signed.extend_from_slice(id.as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(timestamp.as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(body);

    let expected = hmac_sha256_base64(&signing_key(secret)?, &signed)?;

    let matched = signatures
        .split_whitespace()
        .filter_map(|entry| entry.strip_prefix("v1,"))
        .any(|candidate| secure_compare(&expected, candidate));

    if matched {
        Ok(())
    } else {
        Err(invalid())
    }
}
