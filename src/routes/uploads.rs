//! Photo uploads
//!
//! Multipart images are validated here and forwarded to the external image
//! store; the API never persists file bytes itself, only the returned URLs.

use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::error::{ApiError, ApiResult};
use crate::services::image_store::StoredImage;

pub const MAX_FILES_PER_UPLOAD: usize = 10;
pub const MAX_FILE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_MIME: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub files: Vec<StoredImage>,
}

/// POST /api/uploads
pub async fn upload_photos(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        if files.len() >= MAX_FILES_PER_UPLOAD {
            return Err(ApiError::bad_request(format!(
                "At most {} files per upload",
                MAX_FILES_PER_UPLOAD
            )));
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Each file needs a content type"))?;
        if !ALLOWED_MIME.contains(&content_type.as_str()) {
            return Err(ApiError::bad_request(format!(
                "Unsupported file type '{}'",
                content_type
            )));
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "photo".to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;
        if data.is_empty() {
            return Err(ApiError::bad_request("Empty file"));
        }
        if data.len() > MAX_FILE_BYTES {
            return Err(ApiError::bad_request(format!(
                "Files are limited to {} MB",
                MAX_FILE_BYTES / (1024 * 1024)
            )));
        }

        let stored = state
            .image_store
            .upload(&file_name, &content_type, data.to_vec())
            .await?;
        files.push(stored);
    }

    if files.is_empty() {
        return Err(ApiError::bad_request("No files in upload"));
    }

    tracing::info!(user_id = %auth.id, count = files.len(), "Photos uploaded");

    Ok(Json(DataResponse::new(UploadResult { files })))
}
