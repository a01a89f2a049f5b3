use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use tracing::error;

use crate::hris::HrisError;

/// Every failure an HTTP handler can surface. Rendered as `{success: false, message}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NotReady(String),

    #[error("HRIS request failed: {0}")]
    Upstream(#[from] HrisError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Maps a unique-key violation to a 400, anything else stays a database error.
    pub fn from_write(err: sqlx::Error, duplicate_message: &str) -> Self {
        if is_duplicate_key(&err) {
            Self::Duplicate(duplicate_message.to_string())
        } else {
            Self::Database(err)
        }
    }
}

/// MySQL reports duplicate keys as SQLSTATE 23000 / errno 1062.
pub fn is_duplicate_key(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23000") && db_err.message().contains("Duplicate")
        }
        _ => false,
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Duplicate(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) | ApiError::Database(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Database(e) => {
                error!(error = %e, "Database error");
                "Something went wrong, Contact with system admin".to_string()
            }
            ApiError::Upstream(e) => {
                error!(error = %e, "HRIS error");
                self.to_string()
            }
            ApiError::Internal(m) => {
                error!(message = %m, "Internal error");
                m.clone()
            }
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": message,
        }))
    }
}

/// Turns actix extractor failures (bad JSON, bad query string) into the same envelope.
pub fn extractor_error(err: impl std::fmt::Display) -> actix_web::Error {
    ApiError::Validation(err.to_string()).into()
}
