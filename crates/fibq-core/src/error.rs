// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for fibq-core.
//!
//! Every failure in the pipeline maps to one [`CoreError`] variant with a
//! stable machine-readable code, which the HTTP layer turns into a status.

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the gateway, the stores, the dispatch channel and workers.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// Submitted input was rejected before any side effect happened.
    #[error("Validation error for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// Appending to the durable log failed.
    #[error("Failed to append to durable log: {details}")]
    DurableWrite {
        /// Error details.
        details: String,
    },

    /// Writing a cache entry failed.
    #[error("Failed to write cache entry '{key}': {details}")]
    CacheWrite {
        /// The cache key being written.
        key: String,
        /// Error details.
        details: String,
    },

    /// Reading from the result cache failed.
    #[error("Cache error during '{operation}': {details}")]
    Cache {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// Publishing or subscribing on the dispatch channel failed.
    #[error("Dispatch error during '{operation}': {details}")]
    Dispatch {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// Durable log query failed.
    #[error("Database error during '{operation}': {details}")]
    Database {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// Computing a result failed or was abandoned.
    #[error("Computation for index {index} failed: {reason}")]
    Compute {
        /// The index being computed.
        index: u32,
        /// The reason for failure.
        reason: String,
    },
}

impl CoreError {
    /// Shorthand for a validation failure on `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::DurableWrite { .. } => "DURABLE_WRITE_FAILED",
            Self::CacheWrite { .. } => "CACHE_WRITE_FAILED",
            Self::Cache { .. } => "CACHE_ERROR",
            Self::Dispatch { .. } => "DISPATCH_ERROR",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Compute { .. } => "COMPUTE_FAILED",
        }
    }

    /// Whether the caller sent bad input, as opposed to a backend failing.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Database {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for CoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        CoreError::Database {
            operation: "migrate".to_string(),
            details: err.to_string(),
        }
    }
}
