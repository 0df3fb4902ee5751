//! Cheating Log Module
//!
//! Per-session aggregate of confirmed violations and captured evidence.
//!
//! ## Structure
//! - `types`: SessionId, CandidateIdentity, ViolationCounts, EvidenceRecord, CheatingLog
//! - `aggregator`: the single writer of a session's log, plus producer merge policies

pub mod aggregator;
pub mod types;

pub use aggregator::{normalize_counts, CheatingLogAggregator, LogUpdate, MergePolicy, UpdateSource};
pub use types::{CandidateIdentity, CheatingLog, EvidenceRecord, SessionId, ViolationCounts};
