//! Cheating log model

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use proctor_core::logic::cheating_log::{CandidateIdentity, CheatingLog, EvidenceRecord, ViolationCounts};

use crate::AppError;

#[derive(Debug, Clone, FromRow)]
pub struct CheatingLogRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub exam_id: String,
    pub candidate_name: String,
    pub candidate_email: String,
    pub counts: Json<ViolationCounts>,
    pub evidence: Json<Vec<EvidenceRecord>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity present, and no type carries more evidence than its count
pub fn check_log(log: &CheatingLog) -> Result<(), AppError> {
    log.validate()?;
    if !log.evidence_within_counts() {
        return Err(AppError::ValidationError(
            "evidence exceeds violation counts".to_string(),
        ));
    }
    Ok(())
}

impl CheatingLogRow {
    pub fn to_log(&self) -> CheatingLog {
        CheatingLog {
            session_id: self.session_id.into(),
            candidate_identity: CandidateIdentity::new(&self.candidate_name, &self.candidate_email),
            exam_id: self.exam_id.clone(),
            counts: self.counts.0,
            evidence: self.evidence.0.clone(),
        }
    }

    /// A session's log is written once at teardown; a re-send replaces it
    pub async fn upsert(pool: &PgPool, log: &CheatingLog) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, CheatingLogRow>(
            r#"
            INSERT INTO cheating_logs (session_id, exam_id, candidate_name, candidate_email, counts, evidence)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (session_id) DO UPDATE SET
                counts = EXCLUDED.counts,
                evidence = EXCLUDED.evidence,
                updated_at = NOW()
            RETURNING *
            "#
        )
        .bind(log.session_id.as_uuid())
        .bind(log.exam_id.trim())
        .bind(&log.candidate_identity.name)
        .bind(&log.candidate_identity.email)
        .bind(Json(log.counts))
        .bind(Json(&log.evidence))
        .fetch_one(pool)
        .await
    }

    pub async fn list_by_exam(pool: &PgPool, exam_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CheatingLogRow>(
            "SELECT * FROM cheating_logs WHERE exam_id = $1 ORDER BY created_at ASC"
        )
        .bind(exam_id.trim())
        .fetch_all(pool)
        .await
    }
}
