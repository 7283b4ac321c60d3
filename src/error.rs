// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::AuthError;
use crate::database::StoreError;
use crate::records::simulate::SimulationError;
use crate::records::RecordError;
use crate::validation::Violation;

/// Every failure a request can end with. Bodies carry a stable `code`
/// and never the underlying cause, which is logged instead.
#[derive(Debug, Error)]
pub enum ApiError {
    // 401
    #[error("authorization header missing")]
    MissingAuthorization,

    // 400
    #[error("authorization scheme is not bearer")]
    BadScheme,

    // 401
    #[error("api key not found or expired")]
    TokenNotFound,

    // 403
    #[error("forbidden")]
    Forbidden,

    // 404
    #[error("not found")]
    NotFound,

    // 405
    #[error("method not allowed")]
    MethodNotAllowed,

    // 400
    #[error("unexpected request format")]
    UnexpectedFormat,

    // 400
    #[error("invalid document")]
    InvalidFormat(Vec<Violation>),

    // 409
    #[error("already exists")]
    AlreadyExists,

    // 409
    #[error("duplicate key")]
    DuplicateKey,

    // 500
    #[error("internal error")]
    Internal,
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::MissingAuthorization => 401,
            ApiError::BadScheme => 400,
            ApiError::TokenNotFound => 401,
            ApiError::Forbidden => 403,
            ApiError::NotFound => 404,
            ApiError::MethodNotAllowed => 405,
            ApiError::UnexpectedFormat => 400,
            ApiError::InvalidFormat(_) => 400,
            ApiError::AlreadyExists => 409,
            ApiError::DuplicateKey => 409,
            ApiError::Internal => 500,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::MissingAuthorization => "authorization:missing-header",
            ApiError::BadScheme => "authorization:bad-scheme",
            ApiError::TokenNotFound => "authorization:not-found",
            ApiError::Forbidden => "authorization:forbidden",
            ApiError::NotFound => "not-found",
            ApiError::MethodNotAllowed => "method-not-allowed",
            ApiError::UnexpectedFormat => "format:unexpected",
            ApiError::InvalidFormat(_) => "format:invalid",
            ApiError::AlreadyExists => "already-exists",
            ApiError::DuplicateKey => "duplicate-key",
            ApiError::Internal => "internal-error",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::InvalidFormat(violations) => json!({
                "code": self.error_code(),
                "errors": violations,
            }),
            _ => json!({ "code": self.error_code() }),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_duplicate_key() {
            tracing::debug!("Duplicate key: {}", err);
            return ApiError::DuplicateKey;
        }
        // Log the real error but return generic message
        tracing::error!("Store error: {}", err);
        ApiError::Internal
    }
}

impl From<RecordError> for ApiError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound => ApiError::NotFound,
            RecordError::Store(e) => e.into(),
        }
    }
}

impl From<SimulationError> for ApiError {
    fn from(err: SimulationError) -> Self {
        match err {
            SimulationError::Store(e) => e.into(),
            SimulationError::Rejected(e) => {
                tracing::debug!("Patch rejected: {}", e);
                ApiError::UnexpectedFormat
            }
            other => {
                tracing::error!("Simulated update failed: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingHeader => ApiError::MissingAuthorization,
            AuthError::BadScheme => ApiError::BadScheme,
            AuthError::NotFound => ApiError::TokenNotFound,
            AuthError::Forbidden => ApiError::Forbidden,
            AuthError::Store(e) => {
                tracing::error!("Token lookup failed: {}", e);
                ApiError::Internal
            }
            AuthError::Decode(e) => {
                tracing::error!("Stored token is malformed: {}", e);
                ApiError::Internal
            }
        }
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
