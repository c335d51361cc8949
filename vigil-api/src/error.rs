//! Error Types for the Vigil API
//!
//! - `ErrorCode` categorizes failures and maps them to HTTP status codes
//! - `ApiError` carries the code and a human-readable message
//!
//! Error bodies are plain text: clients of the analyze endpoint read the
//! message directly (e.g. `Analysis failed: <reason>`).

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_core::VigilError;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request body could not be decoded
    InvalidInput,

    /// Required field is missing or blank
    MissingField,

    /// Field format is incorrect (e.g. not RFC3339)
    InvalidFormat,

    /// Range bounds are inverted
    InvalidRange,

    // ========================================================================
    // Server Errors (500, 504)
    // ========================================================================
    /// The analysis pipeline failed
    AnalysisFailed,

    /// Startup or infrastructure failure
    InternalError,

    /// Analysis did not finish within the request timeout
    Timeout,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidFormat
            | ErrorCode::InvalidRange => StatusCode::BAD_REQUEST,

            ErrorCode::AnalysisFailed | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Error returned by API handlers and the server bootstrap.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorCode::MissingField, format!("Missing {}", field))
    }

    /// e.g. `invalid_format("start time")` -> "Invalid start time format"
    pub fn invalid_format(what: &str) -> Self {
        Self::new(ErrorCode::InvalidFormat, format!("Invalid {} format", what))
    }

    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRange, message)
    }

    pub fn analysis_failed(cause: impl fmt::Display) -> Self {
        Self::new(ErrorCode::AnalysisFailed, format!("Analysis failed: {}", cause))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn timeout(operation: &str, after: std::time::Duration) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("{} timed out after {}s", operation, after.as_secs()),
        )
    }
}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message,
        )
            .into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Pipeline errors. Validation problems are the caller's fault; everything
/// else is an analysis failure.
impl From<VigilError> for ApiError {
    fn from(err: VigilError) -> Self {
        match err {
            VigilError::Validation(e) => ApiError::invalid_input(e.to_string()),
            VigilError::Config(e) => ApiError::internal_error(e.to_string()),
            other => ApiError::analysis_failed(other),
        }
    }
}

impl From<serde_yaml::Error> for ApiError {
    fn from(err: serde_yaml::Error) -> Self {
        ApiError::internal_error(format!("Invalid config file: {}", err))
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{LlmError, ValidationError};

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidFormat.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ErrorCode::AnalysisFailed.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ErrorCode::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_invalid_format_message() {
        let err = ApiError::invalid_format("start time");
        assert_eq!(err.message, "Invalid start time format");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_pipeline_error_becomes_analysis_failed() {
        let err: ApiError = VigilError::from(LlmError::EmptyCompletion {
            provider: "openai".to_string(),
        })
        .into();
        assert_eq!(err.code, ErrorCode::AnalysisFailed);
        assert!(err.message.starts_with("Analysis failed: "));
        assert!(err.message.contains("Empty completion from openai"));
    }

    #[test]
    fn test_validation_error_is_bad_request() {
        let err: ApiError = VigilError::from(ValidationError::RequiredFieldMissing {
            field: "question".to_string(),
        })
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_display() {
        let err = ApiError::internal_error("bind failed");
        assert_eq!(err.to_string(), "InternalError: bind failed");
    }
}
