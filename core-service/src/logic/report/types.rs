//! Proctoring Report Types
//!
//! The persisted per-(exam, candidate) summary. Wire names are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::logic::cheating_log::ViolationCounts;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuspiciousEvents {
    pub multiple_faces: u32,
    pub no_face_detected: u32,
    pub phone_detected: u32,
    pub notes_detected: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProctoringReport {
    pub candidate_name: String,
    pub candidate_email: String,
    pub exam_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Whole minutes, rounded
    pub interview_duration: i64,
    pub focus_lost_count: u32,
    pub suspicious_events: SuspiciousEvents,
    pub integrity_score: u32,
}

impl ProctoringReport {
    /// Counts carried by the report, back in log form
    pub fn counts(&self) -> ViolationCounts {
        ViolationCounts {
            no_face: self.suspicious_events.no_face_detected,
            multiple_face: self.suspicious_events.multiple_faces,
            cell_phone: self.suspicious_events.phone_detected,
            prohibited_object: self.suspicious_events.notes_detected,
            focus_lost: self.focus_lost_count,
        }
    }

    pub fn key(&self) -> ReportKey {
        ReportKey::new(&self.exam_id, &self.candidate_email)
    }
}

/// Uniqueness key: at most one report per (exam, candidate email)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportKey {
    pub exam_id: String,
    pub candidate_email: String,
}

impl ReportKey {
    /// Emails compare case-insensitively
    pub fn new(exam_id: &str, candidate_email: &str) -> Self {
        Self {
            exam_id: exam_id.trim().to_string(),
            candidate_email: candidate_email.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for ReportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.exam_id, self.candidate_email)
    }
}
