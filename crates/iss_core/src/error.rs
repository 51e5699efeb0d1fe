use serde::{Deserialize, Serialize};
use std::fmt;

/// Single structured error shape used across the core and mapped onto HTTP statuses by the server.
///
/// The `code` carries the category by convention:
/// - `*_NOT_FOUND` for missing tickets/services,
/// - `VALIDATION_*` for rejected input,
/// - `*_CONFLICT` for writes that clash with current state,
/// - anything else is a store failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Validation,
    Conflict,
    Store,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn category(&self) -> ErrorCategory {
        if self.code.ends_with("_NOT_FOUND") {
            ErrorCategory::NotFound
        } else if self.code.starts_with("VALIDATION_") {
            ErrorCategory::Validation
        } else if self.code.ends_with("_CONFLICT") {
            ErrorCategory::Conflict
        } else {
            ErrorCategory::Store
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
