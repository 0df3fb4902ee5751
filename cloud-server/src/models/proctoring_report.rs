//! Proctoring report model
//!
//! Stored flattened, one row per (exam, candidate). Duration and score are
//! always recomputed from counts and timestamps before a write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use proctor_core::logic::report::{self, ProctoringReport, ReportKey, SuspiciousEvents};
use proctor_core::ProctorResult;

#[derive(Debug, Clone, FromRow)]
pub struct ProctoringReportRow {
    pub id: Uuid,
    pub exam_id: String,
    pub candidate_name: String,
    pub candidate_email: String,
    pub candidate_email_key: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub interview_duration: i64,
    pub focus_lost_count: i32,
    pub multiple_faces: i32,
    pub no_face_detected: i32,
    pub phone_detected: i32,
    pub notes_detected: i32,
    pub integrity_score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Incoming report. Client-computed duration and score are ignored.
/// Identity fields are trimmed on the way in, so validation sees what is stored.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReport {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 255))]
    pub candidate_name: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(email)]
    pub candidate_email: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 255))]
    pub exam_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub focus_lost_count: u32,
    #[serde(default)]
    pub suspicious_events: SuspiciousEvents,
}

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|s| s.trim().to_string())
}

impl SubmitReport {
    /// Report with server-side duration and score
    pub fn into_report(self) -> ProctorResult<ProctoringReport> {
        let submitted = ProctoringReport {
            candidate_name: self.candidate_name,
            candidate_email: self.candidate_email,
            exam_id: self.exam_id,
            start_time: self.start_time,
            end_time: self.end_time,
            interview_duration: 0,
            focus_lost_count: self.focus_lost_count,
            suspicious_events: self.suspicious_events,
            integrity_score: 0,
        };

        report::recompute(&submitted)
    }
}

fn db_count(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn wire_count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

impl ProctoringReportRow {
    pub fn to_report(&self) -> ProctoringReport {
        ProctoringReport {
            candidate_name: self.candidate_name.clone(),
            candidate_email: self.candidate_email.clone(),
            exam_id: self.exam_id.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            interview_duration: self.interview_duration,
            focus_lost_count: wire_count(self.focus_lost_count),
            suspicious_events: SuspiciousEvents {
                multiple_faces: wire_count(self.multiple_faces),
                no_face_detected: wire_count(self.no_face_detected),
                phone_detected: wire_count(self.phone_detected),
                notes_detected: wire_count(self.notes_detected),
            },
            integrity_score: wire_count(self.integrity_score),
        }
    }

    /// Insert, or overwrite the existing row for the same key (id kept)
    pub async fn upsert(pool: &PgPool, report: &ProctoringReport) -> Result<Self, sqlx::Error> {
        let key = report.key();
        let events = &report.suspicious_events;

        sqlx::query_as::<_, ProctoringReportRow>(
            r#"
            INSERT INTO proctoring_reports (
                exam_id, candidate_name, candidate_email, candidate_email_key,
                start_time, end_time, interview_duration, focus_lost_count,
                multiple_faces, no_face_detected, phone_detected, notes_detected,
                integrity_score
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (exam_id, candidate_email_key) DO UPDATE SET
                candidate_name = EXCLUDED.candidate_name,
                candidate_email = EXCLUDED.candidate_email,
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                interview_duration = EXCLUDED.interview_duration,
                focus_lost_count = EXCLUDED.focus_lost_count,
                multiple_faces = EXCLUDED.multiple_faces,
                no_face_detected = EXCLUDED.no_face_detected,
                phone_detected = EXCLUDED.phone_detected,
                notes_detected = EXCLUDED.notes_detected,
                integrity_score = EXCLUDED.integrity_score,
                updated_at = NOW()
            RETURNING *
            "#
        )
        .bind(&key.exam_id)
        .bind(&report.candidate_name)
        .bind(&report.candidate_email)
        .bind(&key.candidate_email)
        .bind(report.start_time)
        .bind(report.end_time)
        .bind(report.interview_duration)
        .bind(db_count(report.focus_lost_count))
        .bind(db_count(events.multiple_faces))
        .bind(db_count(events.no_face_detected))
        .bind(db_count(events.phone_detected))
        .bind(db_count(events.notes_detected))
        .bind(db_count(report.integrity_score))
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, key: &ReportKey) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProctoringReportRow>(
            "SELECT * FROM proctoring_reports WHERE exam_id = $1 AND candidate_email_key = $2"
        )
        .bind(&key.exam_id)
        .bind(&key.candidate_email)
        .fetch_optional(pool)
        .await
    }

    /// Lowest integrity first, so reviewers see the riskiest candidates on top
    pub async fn list_by_exam(pool: &PgPool, exam_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProctoringReportRow>(
            r#"
            SELECT * FROM proctoring_reports
            WHERE exam_id = $1
            ORDER BY integrity_score ASC, candidate_email_key ASC
            "#
        )
        .bind(exam_id.trim())
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_core::ProctorError;

    fn submission(json: serde_json::Value) -> SubmitReport {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_server_recomputes_score_and_duration() {
        let req = submission(serde_json::json!({
            "candidateName": " Ann ",
            "candidateEmail": "Ann@Example.com",
            "examId": "exam-1",
            "startTime": "2024-05-01T09:00:00Z",
            "endTime": "2024-05-01T09:30:00Z",
            "interviewDuration": 999,
            "focusLostCount": 3,
            "suspiciousEvents": { "multipleFaces": 1, "noFaceDetected": 2, "phoneDetected": 1, "notesDetected": 0 },
            "integrityScore": 100
        }));
        assert!(req.validate().is_ok());

        let report = req.into_report().unwrap();
        assert_eq!(report.candidate_name, "Ann");
        assert_eq!(report.interview_duration, 30);
        // 100 - (3*2 + 1*10 + 2*3 + 1*15)
        assert_eq!(report.integrity_score, 63);
        assert_eq!(report.key().candidate_email, "ann@example.com");
    }

    #[test]
    fn test_validation_rejects_bad_identity() {
        let req = submission(serde_json::json!({
            "candidateName": "",
            "candidateEmail": "not-an-email",
            "examId": "exam-1",
            "startTime": "2024-05-01T09:00:00Z",
            "endTime": "2024-05-01T09:30:00Z"
        }));
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("candidate_name"));
        assert!(fields.contains_key("candidate_email"));
    }

    #[test]
    fn test_padded_identity_is_trimmed_before_validation() {
        let req = submission(serde_json::json!({
            "candidateName": "  Ann ",
            "candidateEmail": " ann@x.io ",
            "examId": " exam-1 ",
            "startTime": "2024-05-01T09:00:00Z",
            "endTime": "2024-05-01T09:10:00Z"
        }));
        assert!(req.validate().is_ok());
        assert_eq!(req.candidate_email, "ann@x.io");

        let report = req.into_report().unwrap();
        assert_eq!(report.exam_id, "exam-1");
        assert_eq!(report.candidate_name, "Ann");
    }

    #[test]
    fn test_blank_name_fails_after_trim() {
        let req = submission(serde_json::json!({
            "candidateName": "   ",
            "candidateEmail": "ann@x.io",
            "examId": "exam-1",
            "startTime": "2024-05-01T09:00:00Z",
            "endTime": "2024-05-01T09:10:00Z"
        }));
        assert!(req.validate().unwrap_err().field_errors().contains_key("candidate_name"));
    }

    #[test]
    fn test_inverted_time_range_rejected() {
        let req = submission(serde_json::json!({
            "candidateName": "Ann",
            "candidateEmail": "ann@example.com",
            "examId": "exam-1",
            "startTime": "2024-05-01T10:00:00Z",
            "endTime": "2024-05-01T09:00:00Z"
        }));
        assert!(matches!(req.into_report(), Err(ProctorError::InvalidTimeRange { .. })));
    }

    #[test]
    fn test_row_round_trips_counts() {
        let now = Utc::now();
        let row = ProctoringReportRow {
            id: Uuid::new_v4(),
            exam_id: "exam-1".into(),
            candidate_name: "Ann".into(),
            candidate_email: "Ann@example.com".into(),
            candidate_email_key: "ann@example.com".into(),
            start_time: now,
            end_time: now,
            interview_duration: 0,
            focus_lost_count: 4,
            multiple_faces: 1,
            no_face_detected: 0,
            phone_detected: 2,
            notes_detected: -1,
            integrity_score: 62,
            created_at: now,
            updated_at: now,
        };
        let report = row.to_report();
        assert_eq!(report.focus_lost_count, 4);
        assert_eq!(report.suspicious_events.phone_detected, 2);
        assert_eq!(report.suspicious_events.notes_detected, 0);
        assert_eq!(report.candidate_email, "Ann@example.com");
    }
}
