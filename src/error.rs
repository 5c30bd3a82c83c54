use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::board::InvariantViolation;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Board bootstrap failed: {0}")]
    BootstrapFailed(String),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Column not found: {0}")]
    ColumnNotFound(Uuid),

    #[error("Board not found: {0}")]
    BoardNotFound(Uuid),

    #[error("Index {index} out of range (column holds {len} tasks)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("Board {0} was modified concurrently")]
    ConcurrentModification(Uuid),

    #[error("Persistence call timed out after {0}ms")]
    PersistenceTimeout(u64),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Board invariant violated: {0}")]
    Invariant(InvariantViolation),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Invariant(v) => {
                // The engine produced an inconsistent board; this is a bug,
                // not a caller mistake.
                tracing::error!("Board invariant violated: {}", v);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::BootstrapFailed(msg) => {
                tracing::error!("Board bootstrap failed: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::TaskNotFound(_)
            | AppError::ColumnNotFound(_)
            | AppError::BoardNotFound(_) => StatusCode::NOT_FOUND,
            AppError::IndexOutOfRange { .. }
            | AppError::InvalidHierarchy(_)
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::ConcurrentModification(_) => StatusCode::CONFLICT,
            AppError::PersistenceTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };

        let message = match &self {
            AppError::Database(_) => "Database error occurred".to_string(),
            AppError::Invariant(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
