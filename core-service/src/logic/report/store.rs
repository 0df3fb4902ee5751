//! Report Store
//!
//! Persistence seam for reports and cheating logs. The cloud client is the
//! production implementation; `InMemoryReportStore` backs the replay agent
//! when no server is configured, and the tests.
//!
//! Duplicate submissions for the same (exam, candidate) overwrite the prior
//! report and keep its id, so lookups by that pair always see one result.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use super::types::{ProctoringReport, ReportKey};
use crate::logic::cheating_log::{CheatingLog, SessionId};
use crate::logic::error::ProctorError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unavailable(String),

    #[error("store rejected the record: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Rejections will fail again; only unavailability is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<StoreError> for ProctorError {
    fn from(err: StoreError) -> Self {
        ProctorError::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Upsert by (exam, candidate email). Returns the report id.
    async fn save_report(&self, report: &ProctoringReport) -> Result<String, StoreError>;

    /// `Ok(None)` when nothing was persisted for the pair
    async fn find_report(
        &self,
        exam_id: &str,
        candidate_email: &str,
    ) -> Result<Option<ProctoringReport>, StoreError>;

    async fn list_reports(&self, exam_id: &str) -> Result<Vec<ProctoringReport>, StoreError>;

    /// Upsert by session id
    async fn save_cheating_log(&self, log: &CheatingLog) -> Result<(), StoreError>;

    async fn list_cheating_logs(&self, exam_id: &str) -> Result<Vec<CheatingLog>, StoreError>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

#[derive(Default)]
pub struct InMemoryReportStore {
    reports: RwLock<HashMap<ReportKey, (String, ProctoringReport)>>,
    logs: RwLock<HashMap<SessionId, CheatingLog>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_count(&self) -> usize {
        self.reports.read().len()
    }

    pub fn report_id(&self, exam_id: &str, candidate_email: &str) -> Option<String> {
        self.reports
            .read()
            .get(&ReportKey::new(exam_id, candidate_email))
            .map(|(id, _)| id.clone())
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn save_report(&self, report: &ProctoringReport) -> Result<String, StoreError> {
        if report.exam_id.trim().is_empty() || report.candidate_email.trim().is_empty() {
            return Err(StoreError::Rejected("exam id and candidate email are required".into()));
        }

        let mut reports = self.reports.write();
        let key = report.key();
        let id = match reports.get(&key) {
            Some((id, _)) => {
                log::info!("Overwriting existing report {} for {}", id, key);
                id.clone()
            }
            None => Uuid::new_v4().to_string(),
        };
        reports.insert(key, (id.clone(), report.clone()));
        Ok(id)
    }

    async fn find_report(
        &self,
        exam_id: &str,
        candidate_email: &str,
    ) -> Result<Option<ProctoringReport>, StoreError> {
        Ok(self
            .reports
            .read()
            .get(&ReportKey::new(exam_id, candidate_email))
            .map(|(_, report)| report.clone()))
    }

    async fn list_reports(&self, exam_id: &str) -> Result<Vec<ProctoringReport>, StoreError> {
        let mut reports: Vec<_> = self
            .reports
            .read()
            .iter()
            .filter(|(key, _)| key.exam_id == exam_id.trim())
            .map(|(_, (_, report))| report.clone())
            .collect();
        reports.sort_by(|a, b| a.candidate_email.cmp(&b.candidate_email));
        Ok(reports)
    }

    async fn save_cheating_log(&self, log: &CheatingLog) -> Result<(), StoreError> {
        self.logs.write().insert(log.session_id, log.clone());
        Ok(())
    }

    async fn list_cheating_logs(&self, exam_id: &str) -> Result<Vec<CheatingLog>, StoreError> {
        Ok(self
            .logs
            .read()
            .values()
            .filter(|log| log.exam_id == exam_id.trim())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::report::types::SuspiciousEvents;
    use chrono::Utc;

    fn report(exam: &str, email: &str, score: u32) -> ProctoringReport {
        let now = Utc::now();
        ProctoringReport {
            candidate_name: "Ann".into(),
            candidate_email: email.into(),
            exam_id: exam.into(),
            start_time: now,
            end_time: now,
            interview_duration: 0,
            focus_lost_count: 0,
            suspicious_events: SuspiciousEvents::default(),
            integrity_score: score,
        }
    }

    #[tokio::test]
    async fn test_missing_report_is_none() {
        let store = InMemoryReportStore::new();
        assert_eq!(store.find_report("exam-1", "nobody@example.com").await, Ok(None));
    }

    #[tokio::test]
    async fn test_duplicate_submission_overwrites_and_keeps_id() {
        let store = InMemoryReportStore::new();
        let first = store.save_report(&report("exam-1", "ann@example.com", 90)).await.unwrap();
        let second = store.save_report(&report("exam-1", "Ann@Example.com", 70)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.report_count(), 1);
        let found = store.find_report("exam-1", "ann@example.com").await.unwrap().unwrap();
        assert_eq!(found.integrity_score, 70);
    }

    #[tokio::test]
    async fn test_list_reports_by_exam() {
        let store = InMemoryReportStore::new();
        store.save_report(&report("exam-1", "b@example.com", 90)).await.unwrap();
        store.save_report(&report("exam-1", "a@example.com", 80)).await.unwrap();
        store.save_report(&report("exam-2", "a@example.com", 70)).await.unwrap();

        let listed = store.list_reports("exam-1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].candidate_email, "a@example.com");
    }

    #[tokio::test]
    async fn test_report_without_key_is_rejected() {
        let store = InMemoryReportStore::new();
        let err = store.save_report(&report("", "a@example.com", 90)).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_cheating_logs_upsert_by_session() {
        use crate::logic::cheating_log::CandidateIdentity;

        let store = InMemoryReportStore::new();
        let mut log = CheatingLog::new(SessionId::new(), "exam-1", CandidateIdentity::new("A", "a@b.c"));
        store.save_cheating_log(&log).await.unwrap();
        log.counts.focus_lost = 4;
        store.save_cheating_log(&log).await.unwrap();

        let logs = store.list_cheating_logs("exam-1").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].counts.focus_lost, 4);
    }
}
