//! Logic Module - Proctoring Pipeline
//!
//! ## Architecture
//! - `detection/` - Frame & focus classification, per-type debounce
//! - `cheating_log/` - Per-session counts + evidence, merge policies
//! - `evidence/` - Snapshot upload tasks
//! - `scoring/` - Integrity score (pure)
//! - `report/` - Report building, persistence, outbox
//! - `session/` - Session runtime and registry
//! - `cloud_sync/` - HTTP client for the persistence service
//! - `telemetry/` - JSONL audit trail

// Pipeline stages
pub mod detection;
pub mod cheating_log;
pub mod evidence;
pub mod scoring;
pub mod report;
pub mod session;

// Infrastructure
pub mod cloud_sync;
pub mod config;
pub mod error;
pub mod telemetry;
