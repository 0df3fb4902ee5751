//! Cheating log handlers

use axum::{extract::{State, Path}, Json};
use serde::Serialize;

use proctor_core::logic::cheating_log::CheatingLog;

use crate::{AppState, AppResult};
use crate::models::{check_log, CheatingLogRow};
use crate::middleware::auth::ClientContext;

#[derive(Debug, Serialize)]
pub struct SavedLog {
    pub id: String,
}

pub async fn save(
    State(state): State<AppState>,
    client: ClientContext,
    Json(log): Json<CheatingLog>,
) -> AppResult<Json<SavedLog>> {
    check_log(&log)?;

    let row = CheatingLogRow::upsert(&state.pool, &log).await?;
    tracing::debug!(
        "Cheating log for session {} saved by {} ({} evidence)",
        log.session_id,
        client.subject,
        log.evidence.len()
    );

    Ok(Json(SavedLog { id: row.id.to_string() }))
}

pub async fn list_by_exam(
    State(state): State<AppState>,
    _client: ClientContext,
    Path(exam_id): Path<String>,
) -> AppResult<Json<Vec<CheatingLog>>> {
    let rows = CheatingLogRow::list_by_exam(&state.pool, &exam_id).await?;
    Ok(Json(rows.iter().map(CheatingLogRow::to_log).collect()))
}
