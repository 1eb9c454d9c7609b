use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use service_core::error::AppError;

use crate::dtos::ApiResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TestEmailRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WelcomeEmailRequest {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub order_number: Option<String>,
    pub message: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn send_failed(err: AppError) -> Response {
    tracing::error!(error = %err, "Email send failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "message": "Failed to send email",
            "error": err.to_string(),
        })),
    )
        .into_response()
}

pub async fn send_test(
    State(state): State<AppState>,
    Json(payload): Json<TestEmailRequest>,
) -> Result<Response, AppError> {
    let to = present(&payload.email)
        .ok_or_else(|| AppError::bad_request("Email address is required"))?;

    Ok(match state.email.send_test(to).await {
        Ok(()) => ApiResponse::message("Test email sent successfully!").into_response(),
        Err(e) => send_failed(e),
    })
}

pub async fn send_welcome(
    State(state): State<AppState>,
    Json(payload): Json<WelcomeEmailRequest>,
) -> Result<Response, AppError> {
    let to = present(&payload.email)
        .ok_or_else(|| AppError::bad_request("Email address is required"))?;
    let name = present(&payload.name).unwrap_or("there");

    Ok(match state.email.send_welcome(to, name).await {
        Ok(()) => ApiResponse::message("Welcome email sent successfully!").into_response(),
        Err(e) => send_failed(e),
    })
}

/// Contact form. The message goes to the store inbox with the sender as
/// reply-to.
pub async fn contact(
    State(state): State<AppState>,
    Json(payload): Json<ContactRequest>,
) -> Result<Response, AppError> {
    let (Some(name), Some(email), Some(message)) = (
        present(&payload.name),
        present(&payload.email),
        present(&payload.message),
    ) else {
        return Err(AppError::bad_request("Name, email, and message are required"));
    };
    let subject = present(&payload.subject).unwrap_or("General inquiry");

    let sent = state
        .email
        .forward_contact(name, email, subject, present(&payload.order_number), message)
        .await;

    Ok(match sent {
        Ok(()) => {
            tracing::info!(from = %email, subject = %subject, "Contact form forwarded");
            ApiResponse::message("Message received! We will get back to you soon.").into_response()
        }
        Err(e) => send_failed(e),
    })
}
