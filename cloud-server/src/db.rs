//! Database module - PostgreSQL connection and schema

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Apply the schema. Every statement is idempotent.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Multiple statements need the simple query protocol
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Liveness probe used by `/health`
pub async fn ping(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

const SCHEMA_SQL: &str = r#"
-- One report per (exam, candidate). candidate_email_key is the trimmed,
-- lowercased email and carries the uniqueness constraint.
CREATE TABLE IF NOT EXISTS proctoring_reports (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    exam_id VARCHAR(255) NOT NULL,
    candidate_name VARCHAR(255) NOT NULL,
    candidate_email VARCHAR(255) NOT NULL,
    candidate_email_key VARCHAR(255) NOT NULL,
    start_time TIMESTAMPTZ NOT NULL,
    end_time TIMESTAMPTZ NOT NULL,
    interview_duration BIGINT NOT NULL,
    focus_lost_count INT NOT NULL DEFAULT 0,
    multiple_faces INT NOT NULL DEFAULT 0,
    no_face_detected INT NOT NULL DEFAULT 0,
    phone_detected INT NOT NULL DEFAULT 0,
    notes_detected INT NOT NULL DEFAULT 0,
    integrity_score INT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (exam_id, candidate_email_key)
);

-- Final per-session logs, evidence included
CREATE TABLE IF NOT EXISTS cheating_logs (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    session_id UUID NOT NULL UNIQUE,
    exam_id VARCHAR(255) NOT NULL,
    candidate_name VARCHAR(255) NOT NULL,
    candidate_email VARCHAR(255) NOT NULL,
    counts JSONB NOT NULL,
    evidence JSONB NOT NULL DEFAULT '[]'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_reports_exam ON proctoring_reports(exam_id);
CREATE INDEX IF NOT EXISTS idx_reports_score ON proctoring_reports(exam_id, integrity_score);
CREATE INDEX IF NOT EXISTS idx_cheating_logs_exam ON cheating_logs(exam_id, created_at);
"#;
