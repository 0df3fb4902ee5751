//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Environment variables override these at startup (see `logic::config`).

/// Default Cloud Server URL (report persistence service)
///
/// For development: http://localhost:8080
pub const DEFAULT_CLOUD_URL: &str = "http://localhost:8080";

/// Detection sampling tick (milliseconds)
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1_000;

/// Minimum time between two confirmed events of the same type (milliseconds)
pub const DEFAULT_COOLDOWN_MS: i64 = 3_000;

/// Upload attempts per evidence snapshot (first try included)
pub const DEFAULT_UPLOAD_ATTEMPTS: u32 = 2;

/// Persist attempts per report before it goes to the outbox
pub const DEFAULT_PERSIST_ATTEMPTS: u32 = 3;

/// Outbox flush interval (seconds)
pub const DEFAULT_OUTBOX_INTERVAL_SECS: u64 = 30;

/// How long a stopped session waits for in-flight evidence (seconds)
pub const DEFAULT_EVIDENCE_DRAIN_SECS: u64 = 10;

/// HTTP timeout for upload and cloud calls (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Exam Proctor";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get cloud server URL from environment or use default
pub fn get_cloud_url() -> String {
    std::env::var("CLOUD_SERVER_URL")
        .unwrap_or_else(|_| DEFAULT_CLOUD_URL.to_string())
}

/// Get the bearer token used against the cloud server, if any
pub fn get_cloud_token() -> Option<String> {
    std::env::var("CLOUD_API_TOKEN").ok().filter(|t| !t.is_empty())
}

/// Read a numeric environment variable, falling back to `default`
pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
