//! Provider error types and retry classification

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Retry classification for provider errors.
///
/// Transient errors are retried by the executor with backoff; Permanent
/// errors abort the run immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Transient,
    Permanent,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Transient => write!(f, "transient"),
            ErrorClass::Permanent => write!(f, "permanent"),
        }
    }
}

/// Errors from a resource provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("invalid attributes for '{resource}': {message}")]
    InvalidAttributes { resource: String, message: String },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Retry classification.
    ///
    /// Unrecognized failures default to Permanent: creates are not
    /// guaranteed idempotent on the provider side, so blind retries are
    /// worse than stopping.
    pub fn class(&self) -> ErrorClass {
        match self {
            ProviderError::RateLimited(_)
            | ProviderError::Timeout(_)
            | ProviderError::Unavailable(_) => ErrorClass::Transient,
            _ => ErrorClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::RateLimited("429".into()).is_transient());
        assert!(ProviderError::Timeout("deadline".into()).is_transient());
        assert!(ProviderError::Unavailable("503".into()).is_transient());
    }

    #[test]
    fn test_permanent_classification() {
        assert_eq!(
            ProviderError::PermissionDenied("403".into()).class(),
            ErrorClass::Permanent
        );
        assert_eq!(
            ProviderError::QuotaExceeded("quota".into()).class(),
            ErrorClass::Permanent
        );
        assert_eq!(
            ProviderError::CommandFailed("unknown".into()).class(),
            ErrorClass::Permanent
        );
    }
}
