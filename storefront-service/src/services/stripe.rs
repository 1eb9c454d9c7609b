//! Stripe REST client.
//!
//! Talks to the PaymentIntents and Refunds APIs with form-encoded requests
//! and verifies `Stripe-Signature` headers on incoming webhooks.

use crate::config::StripeConfig;
use anyhow::{anyhow, Result};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::utils::signature::{hmac_sha256_hex, secure_compare};

/// Webhooks signed further than this from now are rejected.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    config: StripeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Amount in cents.
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    pub id: String,
    pub amount: i64,
    pub status: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// The `id` of the object the event is about, e.g. a payment intent id.
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(|v| v.as_str())
    }
}

/// Parameters for a new payment intent.
#[derive(Debug, Default)]
pub struct CreateIntent<'a> {
    pub amount_cents: i64,
    pub currency: &'a str,
    /// Disable redirect-based payment methods.
    pub no_redirects: bool,
    pub metadata: Vec<(String, String)>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.secret_key.expose_secret().is_empty()
    }

    pub fn currency(&self) -> &str {
        &self.config.currency
    }

    /// Test-mode keys let payment confirmation proceed without a succeeded
    /// intent.
    pub fn is_test_mode(&self) -> bool {
        self.config.secret_key.expose_secret().starts_with("sk_test")
    }

    pub async fn create_payment_intent(&self, params: CreateIntent<'_>) -> Result<PaymentIntent> {
        let mut form = vec![
            ("amount".to_string(), params.amount_cents.to_string()),
            ("currency".to_string(), params.currency.to_lowercase()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        if params.no_redirects {
            form.push((
                "automatic_payment_methods[allow_redirects]".to_string(),
                "never".to_string(),
            ));
        }
        for (key, value) in params.metadata {
            form.push((format!("metadata[{}]", key), value));
        }

        let intent: PaymentIntent = self.post("payment_intents", &form).await?;
        tracing::info!(
            payment_intent_id = %intent.id,
            amount = intent.amount,
            currency = %intent.currency,
            "Stripe payment intent created"
        );
        Ok(intent)
    }

    pub async fn retrieve_payment_intent(&self, id: &str) -> Result<PaymentIntent> {
        self.ensure_configured()?;
        let url = format!("{}/payment_intents/{}", self.config.api_base_url, id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .send()
            .await?;

        Self::parse_response(response, "retrieve_payment_intent").await
    }

    /// Refund a payment intent, fully when `amount_cents` is `None`.
    pub async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount_cents: Option<i64>,
        reason: &str,
    ) -> Result<Refund> {
        let mut form = vec![
            ("payment_intent".to_string(), payment_intent_id.to_string()),
            ("reason".to_string(), reason.to_string()),
        ];
        if let Some(amount) = amount_cents {
            form.push(("amount".to_string(), amount.to_string()));
        }

        let refund: Refund = self.post("refunds", &form).await?;
        tracing::info!(
            refund_id = %refund.id,
            payment_intent_id = %payment_intent_id,
            amount = refund.amount,
            "Stripe refund created"
        );
        Ok(refund)
    }

    /// Verify a `Stripe-Signature` header (`t=<ts>,v1=<hex>[,v1=...]`) over
    /// the raw body and parse the event.
    pub fn construct_event(&self, payload: &[u8], header: &str, now: i64) -> Result<WebhookEvent> {
        let secret = self.config.webhook_secret.expose_secret();
        if secret.is_empty() {
            return Err(anyhow!("Webhook secret not configured"));
        }

        let mut timestamp: Option<i64> = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| anyhow!("Missing timestamp in signature header"))?;
        if signatures.is_empty() {
            return Err(anyhow!("No v1 signatures in signature header"));
        }
        if now.abs_diff(timestamp) > WEBHOOK_TOLERANCE_SECS.unsigned_abs() {
            return Err(anyhow!("Timestamp outside the tolerance zone"));
        }

        let mut signed = format!("{}.", timestamp).into_bytes();
        signed.extend_from_slice(payload);
        let expected = hmac_sha256_hex(secret.as_bytes(), &signed)?;

        if !signatures.iter().any(|sig| secure_compare(&expected, sig)) {
            tracing::warn!("Stripe webhook signature verification failed");
            return Err(anyhow!("No signatures found matching the expected signature"));
        }

        Ok(serde_json::from_slice(payload)?)
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(anyhow!("Stripe credentials not configured"))
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T> {
        self.ensure_configured()?;
        let url = format!("{}/{}", self.config.api_base_url, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .form(form)
            .send()
            .await?;

        Self::parse_response(response, path).await
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        operation: &str,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, operation = %operation, "Stripe response");

        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }

        let (code, message) = match serde_json::from_str::<StripeErrorBody>(&body) {
            Ok(parsed) => (
                parsed.error.code.unwrap_or_else(|| "unknown".to_string()),
                parsed.error.message.unwrap_or_default(),
            ),
            Err(_) => ("unknown".to_string(), body),
        };
        tracing::error!(
            status = %status,
            code = %code,
            message = %message,
            operation = %operation,
            "Stripe request failed"
        );
        Err(anyhow!("Stripe error ({}): {}", code, message))
    }
}
