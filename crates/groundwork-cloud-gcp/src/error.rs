//! gcloud error types and taxonomy classification

use groundwork_cloud::ProviderError;
use thiserror::Error;

/// Errors from the gcloud wrapper
#[derive(Error, Debug)]
pub enum GcpError {
    #[error("gcloud CLI not found; install the Google Cloud SDK")]
    GcloudNotFound,

    #[error("gcloud command failed: {stderr}")]
    CommandFailed { stderr: String },

    #[error("unexpected gcloud output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GcpError>;

/// Whether a failed invocation means the addressed resource is absent
pub fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("not_found")
        || lower.contains("not found")
        || lower.contains("does not exist")
        || lower.contains("404")
}

/// Map a failed gcloud invocation onto the provider error taxonomy.
///
/// gcloud surfaces control-plane errors as text on stderr with the HTTP
/// status and error reason embedded in the message. Anything that cannot
/// be recognized stays a permanent CommandFailed.
pub fn classify_stderr(stderr: &str) -> ProviderError {
    let lower = stderr.to_lowercase();

    if lower.contains("permission denied") || lower.contains("forbidden") || lower.contains("403")
    {
        ProviderError::PermissionDenied(stderr.to_string())
    } else if lower.contains("quota") {
        ProviderError::QuotaExceeded(stderr.to_string())
    } else if lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("429")
    {
        ProviderError::RateLimited(stderr.to_string())
    } else if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("deadline exceeded")
    {
        ProviderError::Timeout(stderr.to_string())
    } else if lower.contains("unavailable")
        || lower.contains("try again later")
        || lower.contains("connection reset")
        || lower.contains("502")
        || lower.contains("503")
    {
        ProviderError::Unavailable(stderr.to_string())
    } else if lower.contains("invalid") || lower.contains("bad request") || lower.contains("400") {
        ProviderError::ApiError(stderr.to_string())
    } else {
        ProviderError::CommandFailed(stderr.to_string())
    }
}

impl From<GcpError> for ProviderError {
    fn from(err: GcpError) -> Self {
        match err {
            GcpError::GcloudNotFound => ProviderError::CommandFailed(err.to_string()),
            GcpError::CommandFailed { stderr } => classify_stderr(&stderr),
            GcpError::Json(e) => ProviderError::Json(e),
            GcpError::Io(e) => ProviderError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundwork_cloud::ErrorClass;

    #[test]
    fn test_transient_stderr_patterns() {
        for stderr in [
            "ERROR: (gcloud.sql.instances.create) Operation timed out.",
            "ERROR: HTTPError 429: Too Many Requests",
            "ERROR: HTTPError 503: Service Unavailable. Please try again later.",
            "ERROR: Deadline exceeded while waiting for operation",
        ] {
            assert_eq!(
                classify_stderr(stderr).class(),
                ErrorClass::Transient,
                "expected transient: {}",
                stderr
            );
        }
    }

    #[test]
    fn test_permanent_stderr_patterns() {
        for stderr in [
            "ERROR: (gcloud.sql.instances.create) HTTPError 403: The client is not authorized. Permission denied.",
            "ERROR: Quota 'CPUS' exceeded in region us-central1",
            "ERROR: HTTPError 400: Invalid request: instance name must match [a-z][-a-z0-9]*",
            "ERROR: something nobody has seen before",
        ] {
            assert_eq!(
                classify_stderr(stderr).class(),
                ErrorClass::Permanent,
                "expected permanent: {}",
                stderr
            );
        }
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found(
            "ERROR: (gcloud.sql.instances.describe) HTTPError 404: The Cloud SQL instance does not exist."
        ));
        assert!(is_not_found("ERROR: bucket gs://missing was not found"));
        assert!(!is_not_found("ERROR: HTTPError 403: Permission denied"));
    }
}
