//! Exam Proctor - Core Service
//!
//! Turns a noisy stream of per-frame detections and window-focus transitions
//! into debounced violation events, aggregates them into a per-session
//! cheating log, and derives a deterministic integrity score and report.
//!
//! ```text
//! DetectionSource ──► classifier ──► debounce ──┬──► aggregator (sync counts)
//!   focus events ──────────────────────────────┘└──► evidence (async upload)
//!                                                          │
//!                      submit / deadline ──► scoring ──► report ──► ReportStore
//! ```

pub mod constants;
pub mod logic;

pub use logic::error::{ProctorError, ProctorResult};
