//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use proctor_core::ProctorError;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    // Auth errors
    #[error("token expired")]
    TokenExpired,
    #[error("token invalid")]
    TokenInvalid,
    #[error("authentication required")]
    Unauthorized,

    // Resource errors
    #[error("not found: {0}")]
    NotFound(String),

    // Validation errors
    #[error("validation error: {0}")]
    ValidationError(String),

    // Database errors
    #[error("database error: {0}")]
    DatabaseError(String),

    // Generic errors
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::TokenExpired | AppError::TokenInvalid | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(_) | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            AppError::TokenExpired => "Token has expired".to_string(),
            AppError::TokenInvalid => "Invalid token".to_string(),
            AppError::Unauthorized => "Authentication required".to_string(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::ValidationError(msg) => format!("Validation error: {}", msg),
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                "Database error occurred".to_string()
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::TokenInvalid,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

/// Caller errors from the shared pipeline rules become 400s
impl From<ProctorError> for AppError {
    fn from(err: ProctorError) -> Self {
        if err.is_caller_error() {
            AppError::ValidationError(err.to_string())
        } else {
            AppError::InternalError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = tokio_test::block_on(axum::body::to_bytes(response.into_body(), usize::MAX)).unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_not_found_body() {
        let (status, body) = body_json(AppError::NotFound("Report not found".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Report not found");
        assert_eq!(body["status"], 404);
    }

    #[test]
    fn test_database_error_is_masked() {
        let (status, body) = body_json(AppError::DatabaseError("relation does not exist".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Database error occurred");
    }

    #[test]
    fn test_proctor_error_mapping() {
        let err = AppError::from(ProctorError::InvalidTimeRange {
            start: "2024-05-01T10:00:00Z".into(),
            end: "2024-05-01T09:00:00Z".into(),
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = AppError::from(ProctorError::Persistence("disk".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_expired_jwt_mapping() {
        let err: jsonwebtoken::errors::Error = jsonwebtoken::errors::ErrorKind::ExpiredSignature.into();
        assert!(matches!(AppError::from(err), AppError::TokenExpired));
    }
}
