//! Report Module
//!
//! Builds the proctoring report at submission time and gets it persisted,
//! at most once per (exam, candidate).
//!
//! ## Structure
//! - `types`: ProctoringReport, SuspiciousEvents, ReportKey
//! - `builder`: duration, counts and score into a report
//! - `store`: ReportStore trait + in-memory implementation
//! - `outbox`: bounded retry, pending queue and its flush loop

pub mod builder;
pub mod outbox;
pub mod store;
pub mod types;

pub use builder::{build_report, interview_duration_minutes, recompute};
pub use outbox::{
    persist_with_retry, spawn_flush_loop, FlushSummary, PersistenceStatus, ReportOutbox,
    ReportPersister,
};
pub use store::{InMemoryReportStore, ReportStore, StoreError};
pub use types::{ProctoringReport, ReportKey, SuspiciousEvents};
