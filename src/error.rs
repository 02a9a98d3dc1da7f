use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Cannot publish course: {0}")]
    PublishGuard(String),

    #[error("Batch {0} is full")]
    BatchFull(Uuid),

    #[error("Enrollment is not open: {0}")]
    NotOpen(String),

    #[error("Batch {0} not found")]
    BatchNotFound(Uuid),

    #[error("Duplicate value: {0}")]
    Duplicate(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl CatalogError {
    pub fn course_not_found(id: Uuid) -> Self {
        CatalogError::NotFound(format!("course {}", id))
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::Validation(_) => "validation_error",
            CatalogError::NotFound(_) => "not_found",
            CatalogError::PublishGuard(_) => "publish_guard",
            CatalogError::BatchFull(_) => "batch_full",
            CatalogError::NotOpen(_) => "not_open",
            CatalogError::BatchNotFound(_) => "batch_not_found",
            CatalogError::Duplicate(_) => "duplicate",
            CatalogError::Conflict(_) => "conflict",
            CatalogError::StoreUnavailable(_) => "store_unavailable",
            CatalogError::CorruptRecord(_) => "corrupt_record",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            CatalogError::Validation(_) => StatusCode::BAD_REQUEST,
            CatalogError::NotFound(_) | CatalogError::BatchNotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::PublishGuard(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CatalogError::BatchFull(_) | CatalogError::Duplicate(_) | CatalogError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            CatalogError::NotOpen(_) => StatusCode::LOCKED,
            CatalogError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CatalogError::CorruptRecord(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CatalogError::NotFound("record".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CatalogError::Duplicate(db.message().to_string())
            }
            sqlx::Error::Decode(e) => CatalogError::CorruptRecord(e.to_string()),
            sqlx::Error::ColumnDecode { index, source } => {
                CatalogError::CorruptRecord(format!("column {}: {}", index, source))
            }
            other => CatalogError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for CatalogError {
    fn from(err: validator::ValidationErrors) -> Self {
        CatalogError::Validation(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            CatalogError::StoreUnavailable(e) => error!("store unavailable: {}", e),
            CatalogError::CorruptRecord(e) => error!("corrupt record: {}", e),
            _ => {}
        }

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
