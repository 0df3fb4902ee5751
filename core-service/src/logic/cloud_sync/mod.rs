//! Cloud Sync Module - Agent to Cloud Communication
//!
//! Persists reports and cheating logs to the proctoring cloud server.
//! Retry and queueing live in `report::outbox`; this module only speaks HTTP.

pub mod client;

pub use client::{CloudConfig, CloudError, HealthResponse, ProctorCloudClient, SavedReportResponse};
