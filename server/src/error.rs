//! HTTP error mapping for API handlers.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use iss_core::error::{AppError, ErrorCategory};
use serde_json::json;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::BadRequest(m) | Self::NotFound(m) | Self::Conflict(m) => m,
            Self::Internal => INTERNAL_ERROR_MESSAGE,
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err.category() {
            ErrorCategory::NotFound => Self::NotFound(err.message),
            ErrorCategory::Validation => Self::BadRequest(err.message),
            ErrorCategory::Conflict => Self::Conflict(err.message),
            ErrorCategory::Store => {
                // Store details stay in the log.
                tracing::error!(
                    code = err.code.as_str(),
                    message = err.message.as_str(),
                    details = err.details.as_deref().unwrap_or(""),
                    "store failure"
                );
                Self::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_statuses() {
        let cases = [
            ("TICKET_NOT_FOUND", StatusCode::NOT_FOUND),
            ("VALIDATION_MISSING_FIELD", StatusCode::BAD_REQUEST),
            ("TICKET_ALREADY_RESOLVED_CONFLICT", StatusCode::CONFLICT),
            ("DB_QUERY_FAILED", StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, status) in cases {
            let api: ApiError = AppError::new(code, "boom").into();
            assert_eq!(api.status(), status, "{code}");
        }
    }

    #[test]
    fn store_errors_hide_details() {
        let api: ApiError = AppError::new("DB_QUERY_FAILED", "Failed to query tickets")
            .with_details("no such table: tickets")
            .into();
        assert_eq!(api, ApiError::Internal);
        assert_eq!(api.message(), INTERNAL_ERROR_MESSAGE);
    }
}
