use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Too many requests: {0}")]
    TooManyRequests(String, Option<u64>),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Bad Gateway: {0}")]
    BadGateway(String),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(anyhow::anyhow!(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(anyhow::anyhow!(message.into()))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(anyhow::anyhow!(message.into()))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(anyhow::anyhow!(message.into()))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) | AppError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests(..) => StatusCode::TOO_MANY_REQUESTS,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalError(_)
            | AppError::DatabaseError(_)
            | AppError::EmailError(_)
            | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::EmailError(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        AppError::EmailError(err.to_string())
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(err: lettre::address::AddressError) -> Self {
        AppError::BadRequest(anyhow::anyhow!("Invalid email address: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl From<bson::ser::Error> for AppError {
    fn from(err: bson::ser::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<bson::de::Error> for AppError {
    fn from(err: bson::de::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

/// Uniform failure envelope returned by every storefront endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (message, details, retry_after) = match self {
            AppError::ValidationError(err) => {
                ("Validation error".to_string(), Some(err.to_string()), None)
            }
            AppError::BadRequest(err)
            | AppError::NotFound(err)
            | AppError::Unauthorized(err)
            | AppError::Forbidden(err)
            | AppError::Conflict(err) => (err.to_string(), None, None),
            AppError::TooManyRequests(msg, retry) => (msg, None, retry),
            AppError::InternalError(err) => {
                tracing::error!(error = ?err, "Internal server error");
                ("Internal server error".to_string(), Some(err.to_string()), None)
            }
            AppError::BadGateway(msg) => {
                tracing::error!(error = %msg, "Upstream provider failure");
                (format!("Bad Gateway: {}", msg), None, None)
            }
            AppError::ServiceUnavailable => ("Service unavailable".to_string(), None, None),
            AppError::DatabaseError(err) => {
                tracing::error!(error = %err, "Database error");
                ("Database error".to_string(), Some(err.to_string()), None)
            }
            AppError::InvalidToken(err) => {
                ("Invalid token".to_string(), Some(err.to_string()), None)
            }
            AppError::EmailError(msg) => {
                tracing::error!(error = %msg, "Email delivery failed");
                ("Email error".to_string(), Some(msg), None)
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "Configuration error");
                ("Configuration error".to_string(), Some(err.to_string()), None)
            }
        };

        let mut res = (
            status,
            Json(ErrorResponse {
                success: false,
                message,
                error: details,
            }),
        )
            .into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn not_found_uses_storefront_envelope() {
        let response = AppError::not_found("Product not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Product not found");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn validation_errors_map_to_bad_request() {
        let mut errors = validator::ValidationErrors::new();
        errors.add("rating", validator::ValidationError::new("range"));

        let response = AppError::from(errors).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Validation error");
        assert!(body["error"].as_str().unwrap_or_default().contains("rating"));
    }

    #[tokio::test]
    async fn rate_limit_sets_retry_after() {
        let response =
            AppError::TooManyRequests("Too many requests".to_string(), Some(7)).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(axum::http::header::RETRY_AFTER).unwrap(),
            "7"
        );
    }

    #[test]
    fn internal_errors_are_500() {
        let err = AppError::from(anyhow::anyhow!("boom"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
