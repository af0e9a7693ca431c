use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// The error taxonomy from the spec (validation/unauthenticated/forbidden/
/// not_found/conflict/rate_limited/unavailable/internal). Each variant
/// carries a machine-readable `reason` slug so clients can branch on it
/// (`alias_taken`, `proposal_limit_reached`, …) without parsing the message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation { reason: &'static str, message: String },

    #[error("unauthenticated")]
    Unauthenticated { reason: &'static str },

    #[error("{message}")]
    Forbidden { reason: &'static str, message: String },

    #[error("not found")]
    NotFound,

    #[error("{message}")]
    Conflict { reason: &'static str, message: String },

    #[error("{message}")]
    RateLimited { reason: &'static str, message: String },

    #[error("{0}")]
    Unavailable(String),

    #[error("internal consistency error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn validation(reason: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation { reason, message: message.into() }
    }

    pub fn unauthenticated(reason: &'static str) -> Self {
        ApiError::Unauthenticated { reason }
    }

    pub fn forbidden(reason: &'static str, message: impl Into<String>) -> Self {
        ApiError::Forbidden { reason, message: message.into() }
    }

    pub fn not_found() -> Self {
        ApiError::NotFound
    }

    pub fn conflict(reason: &'static str, message: impl Into<String>) -> Self {
        ApiError::Conflict { reason, message: message.into() }
    }

    pub fn rate_limited(reason: &'static str, message: impl Into<String>) -> Self {
        ApiError::RateLimited { reason, message: message.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        ApiError::Unavailable(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    reason: String,
    detail: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let reason = match self {
            ApiError::Validation { reason, .. } => reason.to_string(),
            ApiError::Unauthenticated { reason } => reason.to_string(),
            ApiError::Forbidden { reason, .. } => reason.to_string(),
            ApiError::NotFound => "not_found".to_string(),
            ApiError::Conflict { reason, .. } => reason.to_string(),
            ApiError::RateLimited { reason, .. } => reason.to_string(),
            ApiError::Unavailable(_) => "unavailable".to_string(),
            ApiError::Internal(_) => "internal".to_string(),
            ApiError::Database(e) => {
                tracing::error!(error = %e, "database error surfaced to client");
                "internal".to_string()
            }
        };

        let detail = match self {
            ApiError::Database(_) => "internal error".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.status_code().canonical_reason().unwrap_or("error").to_string(),
            reason,
            detail,
        })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
