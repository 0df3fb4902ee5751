//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::{db, AppState};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    database: bool,
    timestamp: i64,
}

/// `degraded` when the database does not answer; agents queue reports then
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = db::ping(&state.pool).await;

    Json(HealthResponse {
        status: if database { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
        timestamp: chrono::Utc::now().timestamp(),
    })
}
