//! Telemetry Module
//!
//! Proctoring audit trail. Every recoverable failure in a session (skipped
//! capture, failed upload, failed tick, queued report) lands here as well as
//! in the log output, so a session's outcome can be explained afterwards.
//!
//! ## Structure
//! - `event.rs` - ProctorEvent struct (immutable, timestamped)
//! - `recorder.rs` - Append-only JSONL writer (thread-safe, rotating)
//!
//! ## Usage
//! ```ignore
//! use crate::logic::telemetry::{self, ProctorEvent};
//!
//! telemetry::init(None)?;
//! telemetry::record(ProctorEvent::tick_failed(session_id, "camera busy"));
//! telemetry::shutdown();
//! ```

pub mod event;
pub mod recorder;

pub use event::{EventType, ProctorEvent};

pub use recorder::{
    count_events_by_type, current_log_file, default_log_dir, events_recorded, init,
    list_log_files, read_events, record, shutdown,
};
