//! Error Types for Waypoint API
//!
//! This module defines error handling for the HTTP layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//! - Mapping from the domain [`WaypointError`] taxonomy to status codes
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use waypoint_core::{StorageError, SynthesisError, WaypointError};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// No live cache entry for the program, or no such step in it
    RoadmapNotFound,

    // ========================================================================
    // Upstream Errors (502, 503)
    // ========================================================================
    /// Curriculum synthesis failed or returned nothing usable
    SynthesisFailed,

    /// No curriculum synthesizer is configured
    SynthesizerUnavailable,

    /// The cache store could not be reached
    StoreUnavailable,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Server configuration is invalid
    ConfigurationError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed | ErrorCode::InvalidInput | ErrorCode::MissingField => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::RoadmapNotFound => StatusCode::NOT_FOUND,

            ErrorCode::SynthesisFailed => StatusCode::BAD_GATEWAY,

            ErrorCode::SynthesizerUnavailable | ErrorCode::StoreUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::InternalError | ErrorCode::ConfigurationError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::RoadmapNotFound => "Roadmap not found",
            ErrorCode::SynthesisFailed => "Curriculum synthesis failed",
            ErrorCode::SynthesizerUnavailable => "Curriculum synthesis is not configured",
            ErrorCode::StoreUnavailable => "Roadmap cache is unavailable",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::ConfigurationError => "Invalid server configuration",
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

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn roadmap_not_found(key: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::RoadmapNotFound,
            format!("No cached roadmap for {}", key),
        )
    }

    pub fn synthesis_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SynthesisFailed, message)
    }

    pub fn synthesizer_unavailable() -> Self {
        Self::from_code(ErrorCode::SynthesizerUnavailable)
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreUnavailable, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigurationError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_input(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::invalid_input(rejection.body_text())
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { key } => ApiError::roadmap_not_found(key),
            StorageError::Unavailable { reason } => {
                tracing::error!(reason = %reason, "Roadmap store unavailable");
                ApiError::store_unavailable("Roadmap cache is unavailable")
            }
            StorageError::Serialization { key, reason } => {
                tracing::error!(program = %key, reason = %reason, "Corrupt roadmap cache entry");
                ApiError::internal_error(format!("Cached roadmap for {} is unreadable", key))
            }
            StorageError::GraphQueryFailed { reason } => {
                tracing::error!(reason = %reason, "Prerequisite graph query failed");
                ApiError::store_unavailable("Prerequisite graph is unavailable")
            }
        }
    }
}

impl From<SynthesisError> for ApiError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::Unavailable => ApiError::synthesizer_unavailable(),
            other => {
                tracing::warn!(error = %other, "Curriculum synthesis failed");
                ApiError::synthesis_failed(other.to_string())
            }
        }
    }
}

impl From<WaypointError> for ApiError {
    fn from(err: WaypointError) -> Self {
        match err {
            WaypointError::Storage(e) => e.into(),
            WaypointError::Synthesis(e) => e.into(),
            WaypointError::Validation(e) => ApiError::validation_failed(e.to_string()),
            WaypointError::Config(e) => ApiError::configuration_error(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
