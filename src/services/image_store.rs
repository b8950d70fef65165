//! Image store client
//!
//! Thin wrapper around the external image host: accepts validated image
//! bytes, forwards them as multipart, returns the stored URL. Any failure
//! surfaces as `ApiError::Upstream`; there are no retries.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ApiError;

#[derive(Clone)]
pub struct ImageStoreClient {
    client: Client,
    base_url: String,
    key: String,
}

/// Metadata returned by the image store for an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredImage {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub bytes: Option<u64>,
}

impl ImageStoreClient {
    pub fn new(base_url: &str, key: &str, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(base_url = base_url, "Image store client initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        })
    }

    /// Upload one image, returning the hosted URL and metadata.
    pub async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<StoredImage, ApiError> {
        let url = format!("{}/upload", self.base_url);

        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| ApiError::bad_request(format!("Invalid content type: {}", e)))?;

        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Image store request failed");
                ApiError::upstream(format!("Image store unavailable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = %status, "Image store rejected upload");
            return Err(ApiError::upstream(format!(
                "Image store returned {}",
                status
            )));
        }

        response.json::<StoredImage>().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse image store response");
            ApiError::upstream("Invalid image store response")
        })
    }
}
