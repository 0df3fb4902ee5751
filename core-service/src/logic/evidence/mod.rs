//! Evidence Module
//!
//! Snapshot capture and upload for confirmed violations. Best-effort:
//! nothing here can change a count or stall the detection loop.
//!
//! ## Structure
//! - `uploader`: UploadService trait + HTTP implementation
//! - `capture`: per-event upload tasks, collected in completion order

pub mod capture;
pub mod uploader;

pub use capture::{evidence_file_name, CaptureOutcome, DispatchOutcome, EvidenceCapturer, SkipReason};
pub use uploader::{content_digest, HttpUploader, UploadError, UploadService};
