//! Agent Configuration
//!
//! Read once at startup from the environment; defaults in `constants`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    self, env_or, DEFAULT_COOLDOWN_MS, DEFAULT_EVIDENCE_DRAIN_SECS, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_OUTBOX_INTERVAL_SECS, DEFAULT_PERSIST_ATTEMPTS, DEFAULT_SAMPLE_INTERVAL_MS,
    DEFAULT_UPLOAD_ATTEMPTS,
};
use crate::logic::evidence::{HttpUploader, UploadError, UploadService};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProctorConfig {
    pub sample_interval_ms: u64,
    pub cooldown_ms: i64,
    /// Hard deadline; `None` means submission only
    pub exam_duration_secs: Option<u64>,
    /// Evidence upload endpoint; no endpoint means no evidence
    pub upload_url: Option<String>,
    pub upload_attempts: u32,
    pub evidence_enabled: bool,
    pub cloud_server_url: String,
    pub cloud_api_token: Option<String>,
    pub persist_attempts: u32,
    pub outbox_interval_secs: u64,
    pub evidence_drain_secs: u64,
    pub http_timeout_secs: u64,
    pub log_dir: Option<PathBuf>,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            exam_duration_secs: None,
            upload_url: None,
            upload_attempts: DEFAULT_UPLOAD_ATTEMPTS,
            evidence_enabled: true,
            cloud_server_url: constants::DEFAULT_CLOUD_URL.to_string(),
            cloud_api_token: None,
            persist_attempts: DEFAULT_PERSIST_ATTEMPTS,
            outbox_interval_secs: DEFAULT_OUTBOX_INTERVAL_SECS,
            evidence_drain_secs: DEFAULT_EVIDENCE_DRAIN_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            log_dir: None,
        }
    }
}

impl ProctorConfig {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        Self {
            sample_interval_ms: env_or("PROCTOR_SAMPLE_INTERVAL_MS", DEFAULT_SAMPLE_INTERVAL_MS).max(1),
            cooldown_ms: env_or("PROCTOR_COOLDOWN_MS", DEFAULT_COOLDOWN_MS).max(0),
            exam_duration_secs: non_empty("PROCTOR_EXAM_DURATION_SECS").and_then(|s| s.parse().ok()),
            upload_url: non_empty("PROCTOR_UPLOAD_URL"),
            upload_attempts: env_or("PROCTOR_UPLOAD_ATTEMPTS", DEFAULT_UPLOAD_ATTEMPTS).clamp(1, 5),
            evidence_enabled: std::env::var("PROCTOR_EVIDENCE_ENABLED")
                .map(|s| s.to_lowercase() != "false" && s != "0")
                .unwrap_or(true),
            cloud_server_url: constants::get_cloud_url(),
            cloud_api_token: constants::get_cloud_token(),
            persist_attempts: env_or("PROCTOR_PERSIST_ATTEMPTS", DEFAULT_PERSIST_ATTEMPTS).max(1),
            outbox_interval_secs: env_or("PROCTOR_OUTBOX_INTERVAL_SECS", DEFAULT_OUTBOX_INTERVAL_SECS).max(1),
            evidence_drain_secs: env_or("PROCTOR_EVIDENCE_DRAIN_SECS", DEFAULT_EVIDENCE_DRAIN_SECS),
            http_timeout_secs: env_or("PROCTOR_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS).max(1),
            log_dir: non_empty("PROCTOR_LOG_DIR").map(PathBuf::from),
        }
    }

    /// Evidence uploader, `None` when evidence is disabled or has no endpoint
    pub fn build_uploader(&self) -> Result<Option<Arc<dyn UploadService>>, UploadError> {
        let url = match (&self.upload_url, self.evidence_enabled) {
            (Some(url), true) => url,
            _ => return Ok(None),
        };

        let uploader: Arc<dyn UploadService> =
            Arc::new(HttpUploader::with_options(url, self.upload_attempts, self.http_timeout_secs)?);
        Ok(Some(uploader))
    }

    /// Per-session knobs handed to each session runtime
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            sample_interval: Duration::from_millis(self.sample_interval_ms),
            cooldown: chrono::Duration::milliseconds(self.cooldown_ms),
            exam_duration: self.exam_duration_secs.map(Duration::from_secs),
            evidence_drain: Duration::from_secs(self.evidence_drain_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub sample_interval: Duration,
    pub cooldown: chrono::Duration,
    pub exam_duration: Option<Duration>,
    pub evidence_drain: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        ProctorConfig::default().session_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = SessionSettings::default();
        assert_eq!(settings.sample_interval, Duration::from_millis(1_000));
        assert_eq!(settings.cooldown, chrono::Duration::milliseconds(3_000));
        assert_eq!(settings.exam_duration, None);
        assert_eq!(settings.evidence_drain, Duration::from_secs(10));
    }

    #[test]
    fn test_default_config_has_bounded_retries() {
        let config = ProctorConfig::default();
        assert_eq!(config.upload_attempts, 2);
        assert_eq!(config.persist_attempts, 3);
        assert!(config.upload_url.is_none());
    }

    #[test]
    fn test_build_uploader() {
        let mut config = ProctorConfig::default();
        assert!(config.build_uploader().unwrap().is_none());

        config.upload_url = Some("http://localhost:9000/upload".into());
        assert!(config.build_uploader().unwrap().is_some());

        config.evidence_enabled = false;
        assert!(config.build_uploader().unwrap().is_none());
    }
}
