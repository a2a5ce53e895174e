//! Error types module
//!
//! All errors are unified under the `AppError` enum which can represent
//! database, storage, signing, and domain-specific errors. Every variant
//! carries presentation metadata (HTTP status, machine-readable code,
//! recoverability, suggested client action) through the `ErrorMetadata`
//! trait so callers can render structured errors instead of bare messages.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the
//! `sqlx` feature.

use std::io;

use crate::access::DenyReason;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like rate limits
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "OFFSET_MISMATCH")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Key material error: {0}")]
    KeyMaterial(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File too large: {0}")]
    QuotaExceeded(String),

    #[error("Rate limited: {operation} exceeded the hourly limit, retry in {retry_after_secs}s")]
    RateLimited {
        operation: String,
        retry_after_secs: u64,
    },

    #[error("Offset mismatch: expected {expected}, got {got}")]
    OffsetMismatch { expected: u64, got: u64 },

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Access denied: {reason}")]
    AccessDenied { reason: DenyReason },

    #[error("Retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<AppError>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable,
/// suggested_action, sensitive, log_level). client_message stays per-variant
/// for dynamic content.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Store(_) => (
            502,
            "STORE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::KeyMaterial(_) => (
            500,
            "KEY_MATERIAL_ERROR",
            false,
            Some("Contact the administrator: signing key material is invalid"),
            true,
            LogLevel::Error,
        ),
        AppError::Signing(_) => (
            500,
            "SIGNING_ERROR",
            false,
            Some("Contact the administrator if this error persists"),
            true,
            LogLevel::Error,
        ),
        AppError::NotConfigured(_) => (
            500,
            "NOT_CONFIGURED",
            false,
            Some("Contact the administrator: the storage backend is not configured"),
            false,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            false,
            Some("Check request format and parameters"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::QuotaExceeded(_) => (
            413,
            "QUOTA_EXCEEDED",
            false,
            Some("Reduce file size below the configured ceiling"),
            false,
            LogLevel::Debug,
        ),
        AppError::RateLimited { .. } => (
            429,
            "RATE_LIMITED",
            true,
            Some("Wait for the rate-limit window to pass and retry"),
            false,
            LogLevel::Warn,
        ),
        AppError::OffsetMismatch { .. } => (
            409,
            "OFFSET_MISMATCH",
            false,
            Some("Query the current offset and resume from there"),
            false,
            LogLevel::Debug,
        ),
        AppError::SessionExpired(_) => (
            410,
            "SESSION_EXPIRED",
            false,
            Some("Create a new upload session"),
            false,
            LogLevel::Debug,
        ),
        AppError::AccessDenied { reason } => match reason {
            DenyReason::NotFound => (
                404,
                "NOT_FOUND",
                false,
                Some("Verify the submission exists"),
                false,
                LogLevel::Debug,
            ),
            _ => (
                403,
                "ACCESS_DENIED",
                false,
                Some("Check that your account may view this submission"),
                false,
                LogLevel::Debug,
            ),
        },
        AppError::RetriesExhausted { .. } => (
            502,
            "RETRIES_EXHAUSTED",
            true,
            Some("The remote backend kept failing; retry later"),
            true,
            LogLevel::Error,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check authentication token"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Store(_) => "Store",
            AppError::KeyMaterial(_) => "KeyMaterial",
            AppError::Signing(_) => "Signing",
            AppError::NotConfigured(_) => "NotConfigured",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::BadRequest(_) => "BadRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::QuotaExceeded(_) => "QuotaExceeded",
            AppError::RateLimited { .. } => "RateLimited",
            AppError::OffsetMismatch { .. } => "OffsetMismatch",
            AppError::SessionExpired(_) => "SessionExpired",
            AppError::AccessDenied { .. } => "AccessDenied",
            AppError::RetriesExhausted { .. } => "RetriesExhausted",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Whether the retry controller may retry this error.
    ///
    /// Transient kinds (remote store, database, rate limit) are retryable;
    /// validation, access, and offset errors are permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Store(_)
                | AppError::RateLimited { .. }
                | AppError::Internal(_)
                | AppError::InternalWithSource { .. }
        )
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Store(_) => "Failed to access the video store".to_string(),
            AppError::KeyMaterial(_) => "Playback signing is misconfigured".to_string(),
            AppError::Signing(_) => "Failed to sign the playback grant".to_string(),
            AppError::NotConfigured(ref msg) => msg.clone(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::BadRequest(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::QuotaExceeded(ref msg) => msg.clone(),
            AppError::RateLimited {
                operation,
                retry_after_secs,
            } => format!(
                "Too many {} requests this hour, retry in {}s",
                operation, retry_after_secs
            ),
            AppError::OffsetMismatch { expected, got } => format!(
                "Chunk offset {} does not match the confirmed offset {}",
                got, expected
            ),
            AppError::SessionExpired(ref msg) => msg.clone(),
            AppError::AccessDenied { reason } => reason.client_message(),
            AppError::RetriesExhausted { attempts, last } => format!(
                "Upstream operation failed after {} attempts: {}",
                attempts,
                last.client_message()
            ),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_mismatch_metadata() {
        let err = AppError::OffsetMismatch {
            expected: 400,
            got: 500,
        };
        assert_eq!(err.http_status_code(), 409);
        assert_eq!(err.error_code(), "OFFSET_MISMATCH");
        assert!(!err.is_recoverable());
        assert!(!err.is_transient());
        assert!(err.client_message().contains("500"));
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn rate_limited_metadata() {
        let err = AppError::RateLimited {
            operation: "upload_slot".to_string(),
            retry_after_secs: 1800,
        };
        assert_eq!(err.http_status_code(), 429);
        assert!(err.is_recoverable());
        assert!(err.client_message().contains("upload_slot"));
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn access_denied_not_found_maps_to_404() {
        let err = AppError::AccessDenied {
            reason: DenyReason::NotFound,
        };
        assert_eq!(err.http_status_code(), 404);

        let err = AppError::AccessDenied {
            reason: DenyReason::Forbidden,
        };
        assert_eq!(err.http_status_code(), 403);
        assert_eq!(err.error_code(), "ACCESS_DENIED");
    }

    #[test]
    fn retries_exhausted_keeps_the_last_error() {
        let err = AppError::RetriesExhausted {
            attempts: 5,
            last: Box::new(AppError::Store("connection reset".to_string())),
        };
        assert_eq!(err.http_status_code(), 502);
        assert!(err.is_recoverable());
        assert!(err.detailed_message().contains("connection reset"));
    }
}
