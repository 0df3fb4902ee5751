//! Proctoring report handlers

use axum::{extract::{State, Path}, Json};
use serde::Serialize;
use validator::Validate;

use proctor_core::logic::report::{ProctoringReport, ReportKey};

use crate::{AppState, AppResult, AppError};
use crate::models::{ProctoringReportRow, SubmitReport};
use crate::middleware::auth::ClientContext;

#[derive(Debug, Serialize)]
pub struct SavedReport {
    pub id: String,
    pub report: ProctoringReport,
}

/// Save a report; a second submission for the same exam and candidate
/// overwrites the first
pub async fn save(
    State(state): State<AppState>,
    client: ClientContext,
    Json(req): Json<SubmitReport>,
) -> AppResult<Json<SavedReport>> {
    req.validate()?;
    let report = req.into_report()?;

    let row = ProctoringReportRow::upsert(&state.pool, &report).await?;
    tracing::info!(
        "Report {} saved for {} by {} (score {})",
        row.id,
        report.key(),
        client.subject,
        row.integrity_score
    );

    Ok(Json(SavedReport {
        id: row.id.to_string(),
        report: row.to_report(),
    }))
}

/// Report for one candidate, 404 when none was submitted
pub async fn get(
    State(state): State<AppState>,
    _client: ClientContext,
    Path((exam_id, candidate_email)): Path<(String, String)>,
) -> AppResult<Json<ProctoringReport>> {
    let key = ReportKey::new(&exam_id, &candidate_email);
    let row = ProctoringReportRow::find(&state.pool, &key)
        .await?
        .ok_or_else(|| AppError::NotFound("Report not found".to_string()))?;

    Ok(Json(row.to_report()))
}

pub async fn list_by_exam(
    State(state): State<AppState>,
    _client: ClientContext,
    Path(exam_id): Path<String>,
) -> AppResult<Json<Vec<ProctoringReport>>> {
    let rows = ProctoringReportRow::list_by_exam(&state.pool, &exam_id).await?;
    Ok(Json(rows.iter().map(ProctoringReportRow::to_report).collect()))
}
