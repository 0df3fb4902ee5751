//! Evidence Upload Service
//!
//! Opaque binary store: bytes in, retrievable URL out.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::constants::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_UPLOAD_ATTEMPTS};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum UploadError {
    #[error("network error: {0}")]
    Network(String),

    #[error("upload service returned {0}")]
    Server(u16),

    #[error("unexpected upload response: {0}")]
    Parse(String),

    #[error("http client setup failed: {0}")]
    Client(String),
}

impl UploadError {
    /// Network failures and 5xx/429 are worth another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Server(code) => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

#[async_trait]
pub trait UploadService: Send + Sync {
    async fn upload(&self, bytes: &[u8], file_name: &str) -> Result<String, UploadError>;
}

/// Hex SHA-256 of the uploaded bytes, sent so the store can verify content
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

// ============================================================================
// HTTP UPLOADER
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    url: Option<String>,
    cdn_url: Option<String>,
}

/// POSTs the raw JPEG to a single endpoint and reads `url` (or `cdnUrl`)
/// from the JSON response
pub struct HttpUploader {
    endpoint: String,
    attempts: u32,
    http_client: reqwest::Client,
}

impl HttpUploader {
    pub fn new(endpoint: &str) -> Result<Self, UploadError> {
        Self::with_options(endpoint, DEFAULT_UPLOAD_ATTEMPTS, DEFAULT_HTTP_TIMEOUT_SECS)
    }

    pub fn with_options(endpoint: &str, attempts: u32, timeout_secs: u64) -> Result<Self, UploadError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| UploadError::Client(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            attempts: attempts.max(1),
            http_client,
        })
    }

    async fn upload_once(&self, bytes: &[u8], file_name: &str, digest: &str) -> Result<String, UploadError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .header("X-File-Name", file_name)
            .header("X-Content-SHA256", digest)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(UploadError::Server(response.status().as_u16()));
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Parse(e.to_string()))?;

        body.url
            .or(body.cdn_url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| UploadError::Parse("response carries no url".to_string()))
    }
}

#[async_trait]
impl UploadService for HttpUploader {
    async fn upload(&self, bytes: &[u8], file_name: &str) -> Result<String, UploadError> {
        let digest = content_digest(bytes);
        let mut attempt = 1;

        loop {
            match self.upload_once(bytes, file_name, &digest).await {
                Ok(url) => return Ok(url),
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    log::warn!("Upload of {} failed (attempt {}): {}", file_name, attempt, e);
                    tokio::time::sleep(Duration::from_millis(250 * attempt as u64)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
