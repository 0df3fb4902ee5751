//! Cloud API Client
//!
//! HTTP client for the proctoring persistence service. Implements
//! `ReportStore`, so sessions persist through it exactly as through the
//! in-memory store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::cheating_log::CheatingLog;
use crate::logic::report::{ProctoringReport, ReportStore, StoreError};

/// Cloud server configuration
#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub server_url: String,
    pub api_token: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        use crate::constants;

        Self {
            server_url: constants::get_cloud_url(),
            api_token: constants::get_cloud_token(),
            timeout_seconds: constants::DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

// Request/Response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedReportResponse {
    pub id: String,
    /// The report as stored, with server-recomputed duration and score
    pub report: ProctoringReport,
}

#[derive(Debug, Deserialize)]
pub struct SavedLogResponse {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

/// Cloud client errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CloudError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Server error: {0}")]
    ServerError(u16),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

impl From<CloudError> for StoreError {
    fn from(err: CloudError) -> Self {
        match err {
            CloudError::NetworkError(_) | CloudError::ServerError(_) => {
                StoreError::Unavailable(err.to_string())
            }
            CloudError::Rejected { .. }
            | CloudError::ParseError(_)
            | CloudError::Unauthorized
            | CloudError::InvalidUrl(_) => {
                StoreError::Rejected(err.to_string())
            }
        }
    }
}

/// Cloud API client
pub struct ProctorCloudClient {
    config: CloudConfig,
    base_url: Url,
    http_client: reqwest::Client,
}

impl ProctorCloudClient {
    pub fn new(config: CloudConfig) -> Result<Self, CloudError> {
        let base_url = Url::parse(config.server_url.trim())
            .map_err(|e| CloudError::InvalidUrl(format!("{}: {}", config.server_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(CloudError::InvalidUrl(config.server_url.clone()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| CloudError::NetworkError(e.to_string()))?;

        Ok(Self { config, base_url, http_client })
    }

    pub fn server_url(&self) -> &str {
        &self.config.server_url
    }

    /// Base URL plus path segments; each segment is percent-encoded, so exam
    /// ids and emails cannot break out of their position
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments.iter().map(|s| s.trim()));
        }
        url
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Check server health
    pub async fn health_check(&self) -> Result<HealthResponse, CloudError> {
        let response = self
            .http_client
            .get(self.url(&["health"]))
            .send()
            .await
            .map_err(|e| CloudError::NetworkError(e.to_string()))?;

        read_json(response).await
    }

    pub async fn save_report(&self, report: &ProctoringReport) -> Result<SavedReportResponse, CloudError> {
        let response = self
            .authorized(self.http_client.post(self.url(&["api", "v1", "proctoring-reports"])))
            .json(report)
            .send()
            .await
            .map_err(|e| CloudError::NetworkError(e.to_string()))?;

        read_json(response).await
    }

    /// `Ok(None)` on 404
    pub async fn find_report(
        &self,
        exam_id: &str,
        candidate_email: &str,
    ) -> Result<Option<ProctoringReport>, CloudError> {
        let url = self.url(&["api", "v1", "proctoring-reports", exam_id, candidate_email]);
        let response = self
            .authorized(self.http_client.get(url))
            .send()
            .await
            .map_err(|e| CloudError::NetworkError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_json(response).await.map(Some)
    }

    pub async fn list_reports(&self, exam_id: &str) -> Result<Vec<ProctoringReport>, CloudError> {
        let url = self.url(&["api", "v1", "proctoring-reports", "exam", exam_id]);
        let response = self
            .authorized(self.http_client.get(url))
            .send()
            .await
            .map_err(|e| CloudError::NetworkError(e.to_string()))?;

        read_json(response).await
    }

    pub async fn save_cheating_log(&self, log: &CheatingLog) -> Result<SavedLogResponse, CloudError> {
        let response = self
            .authorized(self.http_client.post(self.url(&["api", "v1", "cheating-logs"])))
            .json(log)
            .send()
            .await
            .map_err(|e| CloudError::NetworkError(e.to_string()))?;

        read_json(response).await
    }

    pub async fn list_cheating_logs(&self, exam_id: &str) -> Result<Vec<CheatingLog>, CloudError> {
        let url = self.url(&["api", "v1", "cheating-logs", exam_id]);
        let response = self
            .authorized(self.http_client.get(url))
            .send()
            .await
            .map_err(|e| CloudError::NetworkError(e.to_string()))?;

        read_json(response).await
    }
}

#[async_trait]
impl ReportStore for ProctorCloudClient {
    async fn save_report(&self, report: &ProctoringReport) -> Result<String, StoreError> {
        let saved = ProctorCloudClient::save_report(self, report).await?;
        if saved.report.integrity_score != report.integrity_score {
            log::warn!(
                "Server recomputed score for {}: {} -> {}",
                report.key(),
                report.integrity_score,
                saved.report.integrity_score
            );
        }
        Ok(saved.id)
    }

    async fn find_report(
        &self,
        exam_id: &str,
        candidate_email: &str,
    ) -> Result<Option<ProctoringReport>, StoreError> {
        Ok(ProctorCloudClient::find_report(self, exam_id, candidate_email).await?)
    }

    async fn list_reports(&self, exam_id: &str) -> Result<Vec<ProctoringReport>, StoreError> {
        Ok(ProctorCloudClient::list_reports(self, exam_id).await?)
    }

    async fn save_cheating_log(&self, log: &CheatingLog) -> Result<(), StoreError> {
        ProctorCloudClient::save_cheating_log(self, log).await?;
        Ok(())
    }

    async fn list_cheating_logs(&self, exam_id: &str) -> Result<Vec<CheatingLog>, StoreError> {
        Ok(ProctorCloudClient::list_cheating_logs(self, exam_id).await?)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, CloudError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| CloudError::ParseError(e.to_string()));
    }

    Err(status_error(status.as_u16(), response.text().await.unwrap_or_default()))
}

fn status_error(status: u16, body: String) -> CloudError {
    match status {
        401 | 403 => CloudError::Unauthorized,
        408 | 429 => CloudError::ServerError(status),
        400..=499 => {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            CloudError::Rejected { status, message }
        }
        _ => CloudError::ServerError(status),
    }
}
