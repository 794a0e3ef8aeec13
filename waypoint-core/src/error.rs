//! Error types for Waypoint operations

use thiserror::Error;

/// Cache store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The backing store could not be reached or rejected the operation.
    #[error("Cache store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Roadmap cache entry not found: {key}")]
    NotFound { key: String },

    #[error("Failed to (de)serialize roadmap payload for {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Prerequisite graph query failed: {reason}")]
    GraphQueryFailed { reason: String },
}

impl StorageError {
    /// Create an `Unavailable` error from any displayable cause.
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            reason: reason.to_string(),
        }
    }

    /// Create a `NotFound` error for a cache key.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }
}

/// Curriculum synthesis errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("No curriculum synthesizer configured")]
    Unavailable,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: i64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Curriculum synthesis failed for {program}: {reason}")]
    Failed { program: String, reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Waypoint errors.
#[derive(Debug, Clone, Error)]
pub enum WaypointError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Waypoint operations.
pub type WaypointResult<T> = Result<T, WaypointError>;

// =============================================================================
// TESTS
// =============================================================================
