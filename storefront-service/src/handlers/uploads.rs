//! Product image uploads, proxied to Cloudinary.

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::Deserialize;
use service_core::error::AppError;

use crate::dtos::ApiResponse;
use crate::middleware::AdminUser;
use crate::services::cloudinary::{ImageFile, UploadedImage, MAX_FILES};
use crate::AppState;

#[derive(Debug, Default)]
struct UploadForm {
    files: Vec<ImageFile>,
    folder: Option<String>,
}

/// Drain a multipart body, keeping files from `file_field` and the optional
/// `folder` text field.
async fn read_form(mut multipart: Multipart, file_field: &str) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Invalid upload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "folder" {
            let folder = field
                .text()
                .await
                .map_err(|e| AppError::bad_request(format!("Invalid upload: {}", e)))?;
            form.folder = Some(folder).filter(|f| !f.trim().is_empty());
            continue;
        }
        if name != file_field {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("Invalid upload: {}", e)))?;

        let file = ImageFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        };
        file.check().map_err(AppError::bad_request)?;
        form.files.push(file);

        if form.files.len() > MAX_FILES {
            return Err(AppError::bad_request(format!(
                "Too many files. Maximum is {}",
                MAX_FILES
            )));
        }
    }

    Ok(form)
}

fn upload_failed(e: anyhow::Error) -> AppError {
    tracing::error!(error = %e, "Cloudinary upload failed");
    AppError::BadGateway(format!("Image upload failed: {}", e))
}

pub async fn upload_single(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    multipart: Multipart,
) -> Result<ApiResponse<UploadedImage>, AppError> {
    let form = read_form(multipart, "image").await?;
    let folder = form
        .folder
        .unwrap_or_else(|| state.cloudinary.default_folder().to_string());
    let file = form
        .files
        .into_iter()
        .next()
        .ok_or_else(|| AppError::bad_request("No file uploaded"))?;

    let image = state
        .cloudinary
        .upload(file, &folder)
        .await
        .map_err(upload_failed)?;

    tracing::info!(public_id = %image.public_id, "Image uploaded");
    Ok(ApiResponse::with_message(image, "Image uploaded successfully"))
}

pub async fn upload_multiple(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    multipart: Multipart,
) -> Result<ApiResponse<Vec<UploadedImage>>, AppError> {
    let form = read_form(multipart, "images").await?;
    if form.files.is_empty() {
        return Err(AppError::bad_request("No files uploaded"));
    }
    let folder = form
        .folder
        .unwrap_or_else(|| state.cloudinary.default_folder().to_string());

    let uploads = form
        .files
        .into_iter()
        .map(|file| state.cloudinary.upload(file, &folder));
    let images = futures::future::try_join_all(uploads)
        .await
        .map_err(upload_failed)?;

    tracing::info!(count = images.len(), "Images uploaded");
    let message = format!("{} images uploaded successfully", images.len());
    Ok(ApiResponse::with_message(images, message))
}

/// Delete one image. Folder separators in the public id arrive URL-encoded
/// as `%2F` and are decoded by the path extractor.
pub async fn delete_image(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(public_id): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let public_id = public_id.trim();
    if public_id.is_empty() {
        return Err(AppError::bad_request("Public ID is required"));
    }

    let result = state
        .cloudinary
        .destroy(public_id)
        .await
        .map_err(upload_failed)?;

    Ok(ApiResponse::with_message(
        serde_json::json!({ "publicId": public_id, "result": result }),
        "Image deleted successfully",
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMultipleRequest {
    #[serde(default)]
    pub public_ids: Vec<String>,
}

pub async fn delete_multiple(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(payload): Json<DeleteMultipleRequest>,
) -> Result<ApiResponse<Vec<serde_json::Value>>, AppError> {
    if payload.public_ids.is_empty() {
        return Err(AppError::bad_request("Public IDs array is required"));
    }

    let cloudinary = &state.cloudinary;
    let deletions = payload.public_ids.iter().map(|id| async move {
        cloudinary
            .destroy(id)
            .await
            .map(|result| serde_json::json!({ "publicId": id, "result": result }))
    });
    let results = futures::future::try_join_all(deletions)
        .await
        .map_err(upload_failed)?;

    let message = format!("{} images deleted", results.len());
    Ok(ApiResponse::with_message(results, message))
}
